//! Correlation state for one interactive login.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};
use std::fmt::Write;

use crate::error::AuthError;

/// PKCE verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// Sent to the token endpoint.
    pub verifier: String,
    /// Sent to the authorization endpoint.
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh verifier.
    pub fn generate() -> Result<Self, AuthError> {
        let verifier = random_hex(32)?;
        let challenge = compute_code_challenge(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }
}

/// State shared between "browser opened" and "code received".
///
/// Lives for exactly one `acquire_token` call.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    /// Random state parameter for CSRF protection.
    pub state: String,
    /// Present for the PKCE variant only.
    pub pkce: Option<PkcePair>,
    /// Redirect URI sent with both the authorization and token requests.
    pub redirect_uri: String,
}

impl PendingAuthorization {
    /// Create correlation state, with PKCE parameters when `use_pkce` is set.
    pub fn new(redirect_uri: impl Into<String>, use_pkce: bool) -> Result<Self, AuthError> {
        let pkce = if use_pkce {
            Some(PkcePair::generate()?)
        } else {
            None
        };
        Ok(Self {
            state: random_hex(16)?,
            pkce,
            redirect_uri: redirect_uri.into(),
        })
    }

    /// PKCE verifier, if any.
    pub fn code_verifier(&self) -> Option<&str> {
        self.pkce.as_ref().map(|p| p.verifier.as_str())
    }
}

/// Random hex string from `bytes` bytes of OS entropy.
fn random_hex(bytes: usize) -> Result<String, AuthError> {
    let mut buf = vec![0u8; bytes];
    getrandom::getrandom(&mut buf)
        .map_err(|e| AuthError::authorization(format!("no entropy for OAuth state: {e}")))?;
    let mut s = String::with_capacity(bytes * 2);
    for b in buf {
        let _ = write!(s, "{:02x}", b);
    }
    Ok(s)
}

/// PKCE code challenge from a verifier (S256 method).
pub fn compute_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc7636_challenge_vector() {
        // Appendix B of RFC 7636.
        let challenge = compute_code_challenge("dBjftJeZ4CVP-mJ0kJkDsMBMJ38vbx1iLdhTbBSx8Q");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_verifier_length_is_within_pkce_bounds() {
        let pair = PkcePair::generate().unwrap();
        assert!((43..=128).contains(&pair.verifier.len()));
        assert_eq!(pair.challenge, compute_code_challenge(&pair.verifier));
    }

    #[test]
    fn test_pending_without_pkce() {
        let pending = PendingAuthorization::new("http://localhost:8888", false).unwrap();
        assert!(pending.pkce.is_none());
        assert_eq!(pending.state.len(), 32);
        assert!(pending.code_verifier().is_none());
    }

    #[test]
    fn test_state_is_unique() {
        let a = PendingAuthorization::new("http://localhost:8888", true).unwrap();
        let b = PendingAuthorization::new("http://localhost:8888", true).unwrap();
        assert_ne!(a.state, b.state);
        assert_ne!(a.code_verifier(), b.code_verifier());
    }
}
