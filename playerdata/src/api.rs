//! The PlayerData API entry point.

use std::sync::Arc;

use playerdata_auth::{AuthSession, GrantConfig};
use serde_json::Value;
use tracing::debug;

use crate::client::{GraphqlClient, GraphqlRequest};
use crate::error::ApiResult;

/// Authenticated access to the PlayerData GraphQL API.
///
/// ```rust,ignore
/// use playerdata::{GrantConfig, GrantVariant, PlayerDataApi};
///
/// let api = PlayerDataApi::connect(
///     GrantConfig::new(client_id)
///         .with_client_secret(client_secret)
///         .with_grant_variant(GrantVariant::ClientCredentials),
/// )
/// .await?;
///
/// let data = api
///     .run_query("ClubSessions", CLUB_SESSIONS, Some(json!({"clubIdEq": club_id})))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct PlayerDataApi {
    client: GraphqlClient,
}

impl PlayerDataApi {
    /// Authenticate with `config` and target its API host.
    pub async fn connect(config: GrantConfig) -> ApiResult<Self> {
        let session = AuthSession::connect(config).await?;
        Ok(Self::from_session(Arc::new(session)))
    }

    /// Use an existing session.
    pub fn from_session(session: Arc<AuthSession>) -> Self {
        Self::from_client(GraphqlClient::new(session))
    }

    /// Use a preconfigured transport.
    pub fn from_client(client: GraphqlClient) -> Self {
        Self { client }
    }

    /// The underlying transport.
    pub fn client(&self) -> &GraphqlClient {
        &self.client
    }

    /// The session supplying bearer tokens.
    pub fn session(&self) -> &Arc<AuthSession> {
        self.client.session()
    }

    /// Run the named query operation from `document`.
    pub async fn run_query(
        &self,
        operation_name: &str,
        document: &str,
        variables: Option<Value>,
    ) -> ApiResult<Value> {
        debug!(operation = operation_name, "Running query");
        self.run(operation_name, document, variables).await
    }

    /// Run the named mutation operation from `document`.
    pub async fn run_mutation(
        &self,
        operation_name: &str,
        document: &str,
        variables: Option<Value>,
    ) -> ApiResult<Value> {
        debug!(operation = operation_name, "Running mutation");
        self.run(operation_name, document, variables).await
    }

    async fn run(
        &self,
        operation_name: &str,
        document: &str,
        variables: Option<Value>,
    ) -> ApiResult<Value> {
        let mut request = GraphqlRequest::new(document).with_operation_name(operation_name);
        request.variables = variables;
        self.client.execute(&request).await?.into_data()
    }
}
