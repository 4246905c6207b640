//! Error types for the token lifecycle.
//!
//! Each layer owns its own error enum. [`StoreError`] and
//! [`ListenerError`](crate::listener::ListenerError) are the low-level
//! conditions; [`AuthError`] is the taxonomy that grant flows and the session
//! expose to callers.

use thiserror::Error;

use crate::listener::ListenerError;
use crate::store::StoreError;

/// Errors raised by grant flows and [`AuthSession`](crate::AuthSession).
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable cached token: missing, empty, or past expiry.
    ///
    /// The session recovers from this locally by running a fresh grant.
    #[error("No usable cached token: {0}")]
    TokenUnavailable(#[source] StoreError),

    /// The grant exchange failed, or the callback never produced a code.
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// A token record is missing a field the session depends on.
    #[error("Token record is missing the `{0}` field")]
    MissingField(&'static str),

    /// The configured grant variant name is not one this crate implements.
    #[error("Unsupported grant variant: {0}")]
    UnsupportedGrantVariant(String),

    /// The token record could not be read or written.
    #[error("Token storage error: {0}")]
    Storage(#[source] StoreError),

    /// Required configuration was absent or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias using [`AuthError`].
pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    /// Create an authorization failure.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::AuthorizationFailed(message.into())
    }

    /// Whether a fresh grant can recover from this error.
    pub fn is_token_unavailable(&self) -> bool {
        matches!(self, Self::TokenUnavailable(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) | StoreError::Empty(_) | StoreError::Expired { .. } => {
                Self::TokenUnavailable(err)
            }
            StoreError::Io(_) | StoreError::Serialization(_) => Self::Storage(err),
        }
    }
}

impl From<ListenerError> for AuthError {
    fn from(err: ListenerError) -> Self {
        Self::AuthorizationFailed(err.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::AuthorizationFailed(format!("token request timed out: {err}"))
        } else if err.is_connect() {
            Self::AuthorizationFailed(format!("could not reach authorization server: {err}"))
        } else {
            Self::AuthorizationFailed(err.to_string())
        }
    }
}
