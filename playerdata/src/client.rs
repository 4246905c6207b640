//! GraphQL transport with bearer authentication.

use std::sync::Arc;

use playerdata_auth::AuthSession;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult, GraphQLError};

/// A GraphQL document plus its optional operation name and variables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphqlRequest {
    /// The query or mutation document.
    pub query: String,
    /// Which operation in the document to run.
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// Variable values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl GraphqlRequest {
    /// Create a request for `query`.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: None,
        }
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Set the variables.
    #[must_use]
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

/// The JSON body the GraphQL endpoint answers with.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GraphqlResponse {
    /// Result data, absent when the operation failed entirely.
    #[serde(default)]
    pub data: Option<Value>,
    /// Errors reported by the server.
    #[serde(default)]
    pub errors: Vec<GraphQLError>,
    /// Server-specific extras.
    #[serde(default)]
    pub extensions: Option<Value>,
}

impl GraphqlResponse {
    /// The `data` member, or the server's errors when there are any.
    pub fn into_data(self) -> ApiResult<Value> {
        if !self.errors.is_empty() {
            return Err(ApiError::GraphQL(self.errors));
        }
        Ok(self.data.unwrap_or(Value::Null))
    }
}

/// Posts GraphQL documents with the session's bearer token.
///
/// A 401 triggers one token refresh and one retry.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    http: Client,
    url: String,
    session: Arc<AuthSession>,
}

impl GraphqlClient {
    /// Create a client for the session's configured API host.
    pub fn new(session: Arc<AuthSession>) -> Self {
        let url = session.flow().config().graphql_url();
        Self {
            http: Client::new(),
            url,
            session,
        }
    }

    /// Use a custom reqwest client.
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Post to a different endpoint.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// The GraphQL endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The session supplying bearer tokens.
    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// Run `query` with optional variables and return its `data`.
    pub async fn query(&self, query: &str, variables: Option<Value>) -> ApiResult<Value> {
        let mut request = GraphqlRequest::new(query);
        request.variables = variables;
        self.execute(&request).await?.into_data()
    }

    /// Post a request and decode the response body.
    pub async fn execute(&self, request: &GraphqlRequest) -> ApiResult<GraphqlResponse> {
        let bearer = self.session.current_bearer_token()?;
        let mut response = self.send(request, &bearer).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %self.url, "Bearer token rejected, refreshing");
            let bearer = self.session.refresh_rejected(&bearer).await?;
            response = self.send(request, &bearer).await?;
        }

        let response = check_response(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send(&self, request: &GraphqlRequest, bearer: &str) -> ApiResult<Response> {
        debug!(
            url = %self.url,
            operation = request.operation_name.as_deref().unwrap_or("<anonymous>"),
            "Posting GraphQL request"
        );

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(bearer)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;
        Ok(response)
    }
}

async fn check_response(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::status(status.as_u16(), body));
    }
    Ok(response)
}
