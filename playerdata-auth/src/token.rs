//! Token records as returned by the authorization server and persisted on disk.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as fractional seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// A token record.
///
/// Only `access_token` and `expires_at` are typed. Every other field the server
/// sends, `refresh_token` and `expires_in` included, is kept in `extra` as raw
/// JSON and written back unchanged, so an unexpected shape never makes a record
/// unreadable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Bearer credential. Optional so a malformed server response can still be
    /// stored and reported later.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Absolute expiry as a Unix timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<f64>,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenRecord {
    /// Create a record holding just an access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        let mut record = Self {
            access_token: Some(access_token.into()),
            ..Default::default()
        };
        record.extra.insert("token_type".into(), Value::from("Bearer"));
        record
    }

    /// Set the absolute expiry.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: f64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.set_refresh_token(refresh_token);
        self
    }

    /// Token type, usually `Bearer`.
    pub fn token_type(&self) -> Option<&str> {
        self.extra.get("token_type").and_then(Value::as_str)
    }

    /// Refresh token, when the grant issued one as a string.
    pub fn refresh_token(&self) -> Option<&str> {
        self.extra.get("refresh_token").and_then(Value::as_str)
    }

    /// Replace the refresh token.
    pub fn set_refresh_token(&mut self, refresh_token: impl Into<String>) {
        self.extra
            .insert("refresh_token".into(), Value::from(refresh_token.into()));
    }

    /// Lifetime in seconds, accepting a JSON number or a numeric string.
    pub fn expires_in(&self) -> Option<f64> {
        match self.extra.get("expires_in")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Whether `expires_at` is present and not after `now`.
    ///
    /// Records without `expires_at` never expire at this layer.
    pub fn is_expired_at(&self, now: f64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Whether the record is expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }

    /// Stamp `expires_at` from `expires_in` when the server only sent a lifetime.
    pub(crate) fn stamp_expiry(&mut self, now: f64) {
        if self.expires_at.is_none() {
            if let Some(expires_in) = self.expires_in() {
                self.expires_at = Some(now + expires_in);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unknown_fields_survive_a_roundtrip() {
        let raw = r#"{"access_token":"abc","token_type":"Bearer","club_id":"42","nested":{"a":1}}"#;
        let record: TokenRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.access_token.as_deref(), Some("abc"));
        assert_eq!(record.extra.get("club_id"), Some(&Value::from("42")));

        let back: Value = serde_json::to_value(&record).unwrap();
        let original: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_missing_access_token_deserializes() {
        let record: TokenRecord = serde_json::from_str(r#"{"token_type":"Bearer"}"#).unwrap();
        assert!(record.access_token.is_none());
    }

    #[test]
    fn test_expiry_boundaries() {
        let record = TokenRecord::new("t").with_expires_at(100.0);
        assert!(record.is_expired_at(100.0));
        assert!(record.is_expired_at(150.0));
        assert!(!record.is_expired_at(99.5));
    }

    #[test]
    fn test_no_expiry_never_expires() {
        let record = TokenRecord::new("t");
        assert!(!record.is_expired_at(f64::MAX));
    }

    #[test]
    fn test_stamp_expiry_from_expires_in() {
        let mut record: TokenRecord =
            serde_json::from_str(r#"{"access_token":"t","expires_in":3600}"#).unwrap();
        record.stamp_expiry(1_000.0);
        assert_eq!(record.expires_at, Some(4_600.0));
    }

    #[test]
    fn test_stamp_expiry_keeps_server_value() {
        let mut record = TokenRecord::new("t").with_expires_at(50.0);
        record.extra.insert("expires_in".into(), Value::from(3600));
        record.stamp_expiry(1_000.0);
        assert_eq!(record.expires_at, Some(50.0));
    }

    #[test]
    fn test_loosely_typed_fields_are_tolerated() {
        let raw = r#"{"access_token":"abc","scope":["read","write"],"expires_in":"3600","refresh_token":7,"token_type":null}"#;
        let mut record: TokenRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.access_token.as_deref(), Some("abc"));
        assert_eq!(record.expires_in(), Some(3600.0));
        assert!(record.refresh_token().is_none());
        assert!(record.token_type().is_none());

        record.stamp_expiry(1_000.0);
        assert_eq!(record.expires_at, Some(4_600.0));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["scope"], serde_json::json!(["read", "write"]));
        assert_eq!(back["expires_in"], Value::from("3600"));
    }

    #[test]
    fn test_refresh_token_accessors() {
        let mut record = TokenRecord::new("t").with_refresh_token("r1");
        assert_eq!(record.refresh_token(), Some("r1"));
        record.set_refresh_token("r2");
        assert_eq!(record.refresh_token(), Some("r2"));
        assert_eq!(record.token_type(), Some("Bearer"));
    }
}
