//! GraphQL transport errors.

use playerdata_auth::AuthError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// Human-readable message.
    pub message: String,
    /// Source positions in the query document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Value>>,
    /// Response path of the failing field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    /// Server-specific details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

/// Errors from calling the GraphQL API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Could not obtain or refresh a bearer token.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the GraphQL endpoint.
    #[error("HTTP error {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The server answered with GraphQL errors.
    #[error("GraphQL error: {}", join_messages(.0))]
    GraphQL(Vec<GraphQLError>),

    /// The response body was not the expected JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// Create a status error.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Whether the server rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401, .. })
    }
}

fn join_messages(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for API calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_error_display_joins_messages() {
        let err = ApiError::GraphQL(vec![
            GraphQLError {
                message: "Field 'foo' doesn't exist".into(),
                locations: None,
                path: None,
                extensions: None,
            },
            GraphQLError {
                message: "Variable $id is required".into(),
                locations: None,
                path: None,
                extensions: None,
            },
        ]);
        assert_eq!(
            err.to_string(),
            "GraphQL error: Field 'foo' doesn't exist; Variable $id is required"
        );
    }

    #[test]
    fn test_graphql_error_keeps_details() {
        let error: GraphQLError = serde_json::from_value(serde_json::json!({
            "message": "not authorised",
            "path": ["session", "id"],
            "extensions": {"code": "FORBIDDEN"}
        }))
        .unwrap();

        assert_eq!(error.message, "not authorised");
        assert_eq!(error.path.as_ref().map(Vec::len), Some(2));
        assert!(error.locations.is_none());
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(ApiError::status(401, "").is_unauthorized());
        assert!(!ApiError::status(403, "").is_unauthorized());
    }
}
