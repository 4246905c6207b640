//! The single entry point for obtaining a bearer token.

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::{GrantConfig, GrantVariant};
use crate::error::{AuthError, Result};
use crate::flow::GrantFlow;
use crate::token::TokenRecord;

/// An authenticated session.
///
/// Construction loads the cached token or runs a fresh grant; a session value
/// always holds a token. Tokens are only refreshed on construction or when the
/// transport calls [`refresh`](Self::refresh) after a 401.
pub struct AuthSession {
    flow: GrantFlow,
    token: RwLock<TokenRecord>,
    refreshing: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("flow", &self.flow)
            .field("expires_at", &self.token.read().expires_at)
            .finish_non_exhaustive()
    }
}

impl AuthSession {
    /// Build the grant flow for `config` and authenticate.
    pub async fn connect(config: GrantConfig) -> Result<Self> {
        Self::from_flow(GrantFlow::new(config)?).await
    }

    /// Authenticate with an already configured flow.
    ///
    /// Uses the cached token when there is a usable one and otherwise runs the
    /// grant once. Any other failure propagates unchanged.
    pub async fn from_flow(flow: GrantFlow) -> Result<Self> {
        let token = match flow.get_cached_token().await {
            Ok(token) => {
                debug!(variant = %flow.variant(), "Using cached token");
                token
            }
            Err(AuthError::TokenUnavailable(reason)) => {
                info!(variant = %flow.variant(), %reason, "No usable cached token, logging in");
                flow.acquire_token().await?
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            flow,
            token: RwLock::new(token),
            refreshing: tokio::sync::Mutex::new(()),
        })
    }

    /// The access token to send as a bearer credential.
    pub fn current_bearer_token(&self) -> Result<String> {
        self.token
            .read()
            .access_token
            .clone()
            .ok_or(AuthError::MissingField("access_token"))
    }

    /// `Bearer <token>`, ready for an `Authorization` header.
    pub fn authorization_header(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.current_bearer_token()?))
    }

    /// A copy of the in-memory token record.
    pub fn token(&self) -> TokenRecord {
        self.token.read().clone()
    }

    /// The grant this session was built with.
    pub fn variant(&self) -> GrantVariant {
        self.flow.variant()
    }

    /// The underlying grant flow.
    pub fn flow(&self) -> &GrantFlow {
        &self.flow
    }

    /// Replace the in-memory token after the server rejected it.
    ///
    /// Uses the refresh token when one is held. Client-credentials sessions
    /// without one simply run the grant again; interactive sessions without one
    /// fail, since a browser login is not something to start mid-request.
    pub async fn refresh(&self) -> Result<String> {
        let _guard = self.refreshing.lock().await;
        self.refresh_locked().await
    }

    /// Refresh after the server rejected `rejected`, unless a concurrent caller
    /// already replaced it. Refreshes never run in parallel.
    pub async fn refresh_rejected(&self, rejected: &str) -> Result<String> {
        let _guard = self.refreshing.lock().await;
        if let Ok(current) = self.current_bearer_token() {
            if current != rejected {
                debug!("Token already refreshed by a concurrent request");
                return Ok(current);
            }
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<String> {
        let refresh_token = self.token.read().refresh_token().map(str::to_string);
        let record = match refresh_token {
            Some(refresh_token) => self.flow.refresh(&refresh_token).await?,
            None if self.variant() == GrantVariant::ClientCredentials => {
                self.flow.acquire_token().await?
            }
            None => {
                return Err(AuthError::authorization(
                    "token rejected and no refresh token is available",
                ));
            }
        };

        *self.token.write() = record;
        self.current_bearer_token()
    }

    /// Forget the stored token. The in-memory copy stays usable until dropped.
    pub async fn sign_out(&self) -> Result<()> {
        self.flow.store().clear().await.map_err(AuthError::Storage)
    }
}
