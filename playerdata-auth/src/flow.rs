//! OAuth2 grant execution.
//!
//! [`GrantFlow`] runs one of three grants against `<api_base>/oauth/token`:
//!
//! | Variant | Browser | Token request |
//! |---|---|---|
//! | client credentials | no | `client_id`, `client_secret` |
//! | authorization code | yes | `code`, `client_id`, `client_secret` |
//! | authorization code + PKCE | yes | `code`, `client_id`, `code_verifier` |
//!
//! The interactive variants bind the callback listener for the duration of one
//! attempt and always release it before returning.

use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::browser::{BoxedBrowser, SystemBrowser};
use crate::config::{GrantConfig, GrantVariant};
use crate::error::{AuthError, Result};
use crate::listener::CallbackListener;
use crate::pending::PendingAuthorization;
use crate::store::{BoxedTokenStore, FileTokenStore};
use crate::token::{unix_now, TokenRecord};

/// Variant-specific credentials. The closed set is matched exhaustively.
#[derive(Clone)]
enum Grant {
    ClientCredentials { client_secret: String },
    AuthorizationCode { client_secret: String },
    AuthorizationCodePkce,
}

impl Grant {
    fn from_config(config: &GrantConfig) -> Result<Self> {
        let require_secret = || {
            config.secret().map(str::to_string).ok_or_else(|| {
                AuthError::Configuration(format!(
                    "the {} grant needs a client secret",
                    config.grant_variant
                ))
            })
        };

        Ok(match config.grant_variant {
            GrantVariant::ClientCredentials => Self::ClientCredentials {
                client_secret: require_secret()?,
            },
            GrantVariant::AuthorizationCode => Self::AuthorizationCode {
                client_secret: require_secret()?,
            },
            GrantVariant::AuthorizationCodePkce => Self::AuthorizationCodePkce,
        })
    }

    fn variant(&self) -> GrantVariant {
        match self {
            Self::ClientCredentials { .. } => GrantVariant::ClientCredentials,
            Self::AuthorizationCode { .. } => GrantVariant::AuthorizationCode,
            Self::AuthorizationCodePkce => GrantVariant::AuthorizationCodePkce,
        }
    }

    /// Secret sent to the token endpoint. Never set for PKCE.
    fn client_secret(&self) -> Option<&str> {
        match self {
            Self::ClientCredentials { client_secret }
            | Self::AuthorizationCode { client_secret } => Some(client_secret),
            Self::AuthorizationCodePkce => None,
        }
    }
}

/// Error body from the token endpoint (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Runs one OAuth2 grant and persists its result.
#[derive(Clone)]
pub struct GrantFlow {
    config: GrantConfig,
    grant: Grant,
    store: BoxedTokenStore,
    browser: BoxedBrowser,
    http: Client,
}

impl fmt::Debug for GrantFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantFlow")
            .field("variant", &self.variant())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GrantFlow {
    /// Create the flow selected by `config.grant_variant`.
    ///
    /// Tokens go to a [`FileTokenStore`] at `config.token_storage_location` and
    /// the authorization URL is opened with the [`SystemBrowser`].
    pub fn new(config: GrantConfig) -> Result<Self> {
        let grant = Grant::from_config(&config)?;
        let store = Arc::new(FileTokenStore::new(config.token_storage_location.clone()));
        Ok(Self {
            config,
            grant,
            store,
            browser: Arc::new(SystemBrowser),
            http: Client::new(),
        })
    }

    /// Use a different token store.
    #[must_use]
    pub fn with_store(mut self, store: BoxedTokenStore) -> Self {
        self.store = store;
        self
    }

    /// Use a different browser launcher.
    #[must_use]
    pub fn with_browser(mut self, browser: BoxedBrowser) -> Self {
        self.browser = browser;
        self
    }

    /// Use a preconfigured HTTP client for token requests.
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// The grant this flow runs.
    pub fn variant(&self) -> GrantVariant {
        self.grant.variant()
    }

    /// The configuration this flow was built from.
    pub fn config(&self) -> &GrantConfig {
        &self.config
    }

    /// The token store this flow reads and writes.
    pub fn store(&self) -> &BoxedTokenStore {
        &self.store
    }

    /// Load the cached token.
    ///
    /// Missing, empty and expired records all surface as
    /// [`AuthError::TokenUnavailable`].
    pub async fn get_cached_token(&self) -> Result<TokenRecord> {
        Ok(self.store.load().await?)
    }

    /// Run the grant against the authorization server, save and return the token.
    pub async fn acquire_token(&self) -> Result<TokenRecord> {
        let record = match &self.grant {
            Grant::ClientCredentials { .. } => self.exchange_client_credentials().await?,
            Grant::AuthorizationCode { .. } | Grant::AuthorizationCodePkce => {
                self.authorize_interactively().await?
            }
        };

        self.store.save(&record).await.map_err(AuthError::Storage)?;
        info!(variant = %self.variant(), "Login successful, token saved");
        Ok(record)
    }

    /// Exchange the client id and secret for a token without saving it.
    ///
    /// Works for any variant configured with a secret; intended for scripts
    /// that only need a bearer string.
    pub async fn exchange_client_credentials(&self) -> Result<TokenRecord> {
        let secret = self
            .grant
            .client_secret()
            .or_else(|| self.config.secret())
            .ok_or_else(|| {
                AuthError::Configuration("client credentials need a client secret".into())
            })?;

        let mut params = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", secret),
        ];
        if !self.config.scopes.is_empty() {
            params.push(("scope", self.config.scopes.as_str()));
        }

        self.request_token(&params).await
    }

    /// Exchange a refresh token for a new access token and save it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(secret) = self.grant.client_secret() {
            params.push(("client_secret", secret));
        }

        let mut record = self.request_token(&params).await?;
        // Servers may omit the refresh token when it is not rotated.
        if record.refresh_token().is_none() {
            record.set_refresh_token(refresh_token);
        }

        self.store.save(&record).await.map_err(AuthError::Storage)?;
        debug!("Refreshed access token");
        Ok(record)
    }

    /// Build the authorization URL for one pending login.
    pub fn authorization_url(&self, pending: &PendingAuthorization) -> Result<String> {
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", pending.redirect_uri.as_str()),
            ("state", pending.state.as_str()),
        ];
        if !self.config.scopes.is_empty() {
            params.push(("scope", self.config.scopes.as_str()));
        }
        if let Some(pkce) = &pending.pkce {
            params.push(("code_challenge", pkce.challenge.as_str()));
            params.push(("code_challenge_method", "S256"));
        }

        let url = url::Url::parse_with_params(&self.config.authorize_url(), &params).map_err(
            |e| AuthError::Configuration(format!("invalid API base URL: {e}")),
        )?;
        Ok(url.into())
    }

    async fn authorize_interactively(&self) -> Result<TokenRecord> {
        let pending = PendingAuthorization::new(
            self.config.redirect_uri.clone(),
            matches!(self.grant, Grant::AuthorizationCodePkce),
        )?;

        let mut listener = CallbackListener::new(self.config.local_callback_port)
            .with_expected_state(pending.state.clone());
        listener.start().await?;

        let code = self.wait_for_code(&mut listener, &pending).await;
        listener.stop().await;

        self.exchange_code(&code?, &pending).await
    }

    async fn wait_for_code(
        &self,
        listener: &mut CallbackListener,
        pending: &PendingAuthorization,
    ) -> Result<String> {
        let url = self.authorization_url(pending)?;

        info!("Logging you into the PlayerData API");
        if let Err(e) = self.browser.open(&url) {
            warn!(error = %e, "Could not open a browser for the login page");
        }

        let code = match self.config.callback_timeout {
            Some(timeout) => listener.await_code_timeout(timeout).await?,
            None => listener.await_code().await?,
        };
        Ok(code)
    }

    async fn exchange_code(&self, code: &str, pending: &PendingAuthorization) -> Result<TokenRecord> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", pending.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];
        match &self.grant {
            Grant::AuthorizationCode { client_secret } => {
                params.push(("client_secret", client_secret.as_str()));
            }
            Grant::AuthorizationCodePkce => {
                let verifier = pending.code_verifier().ok_or_else(|| {
                    AuthError::authorization("PKCE login started without a code verifier")
                })?;
                params.push(("code_verifier", verifier));
            }
            Grant::ClientCredentials { .. } => {
                return Err(AuthError::authorization(
                    "client credentials grant has no authorization code",
                ));
            }
        }

        self.request_token(&params).await
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenRecord> {
        let url = self.config.token_url();
        let grant_type = params
            .iter()
            .find_map(|(k, v)| (*k == "grant_type").then_some(*v))
            .unwrap_or_default();
        debug!(%url, grant_type, "Requesting token");

        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => body,
            };
            warn!(%status, grant_type, "Token request rejected");
            return Err(AuthError::AuthorizationFailed(format!(
                "HTTP {}: {}",
                status, detail
            )));
        }

        let mut record: TokenRecord = response.json().await?;
        let now = unix_now();
        record.stamp_expiry(now);
        if record.is_expired_at(now) {
            warn!(grant_type, "Token endpoint returned an already expired token");
            return Err(AuthError::authorization(
                "token endpoint returned a token that has already expired",
            ));
        }
        Ok(record)
    }
}
