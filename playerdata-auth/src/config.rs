//! Grant configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AuthError;
use crate::store::DEFAULT_TOKEN_FILE;

/// Production API host.
pub const API_BASE_URL: &str = "https://app.playerdata.co.uk";

/// Default port for the local callback listener.
pub const DEFAULT_CALLBACK_PORT: u16 = 8888;

/// Which OAuth2 grant a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GrantVariant {
    /// Machine-to-machine: client id and secret only.
    ClientCredentials,
    /// Interactive login for confidential clients.
    #[default]
    AuthorizationCode,
    /// Interactive login for public clients, no shared secret.
    AuthorizationCodePkce,
}

impl GrantVariant {
    /// Canonical configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientCredentials => "client_credentials_flow",
            Self::AuthorizationCode => "authorisation_code_flow",
            Self::AuthorizationCodePkce => "authorisation_code_flow_pcke",
        }
    }

    /// Whether this grant needs a browser and the callback listener.
    pub fn is_interactive(&self) -> bool {
        !matches!(self, Self::ClientCredentials)
    }
}

impl fmt::Display for GrantVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantVariant {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "client_credentials" | "client_credentials_flow" => Ok(Self::ClientCredentials),
            "authorisation_code" | "authorisation_code_flow" | "authorization_code"
            | "authorization_code_flow" => Ok(Self::AuthorizationCode),
            "authorisation_code_flow_pcke" | "authorisation_code_flow_pkce"
            | "authorization_code_flow_pkce" | "authorization_code_pkce" | "pkce" => {
                Ok(Self::AuthorizationCodePkce)
            }
            _ => Err(AuthError::UnsupportedGrantVariant(s.to_string())),
        }
    }
}

/// Configuration for one [`AuthSession`](crate::AuthSession).
#[derive(Clone)]
pub struct GrantConfig {
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret. Never sent by the PKCE variant.
    pub client_secret: Option<String>,
    /// Where the authorization server sends the browser back to.
    pub redirect_uri: String,
    /// Port the callback listener binds on 127.0.0.1.
    pub local_callback_port: u16,
    /// Token file location.
    pub token_storage_location: PathBuf,
    /// Grant to run.
    pub grant_variant: GrantVariant,
    /// API host; `/oauth/authorize` and `/oauth/token` hang off it.
    pub api_base_url: String,
    /// OAuth scopes (space-separated). Omitted from requests when empty.
    pub scopes: String,
    /// How long to wait for the browser callback. `None` waits forever.
    pub callback_timeout: Option<Duration>,
}

impl fmt::Debug for GrantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_uri", &self.redirect_uri)
            .field("local_callback_port", &self.local_callback_port)
            .field("token_storage_location", &self.token_storage_location)
            .field("grant_variant", &self.grant_variant)
            .field("api_base_url", &self.api_base_url)
            .field("scopes", &self.scopes)
            .field("callback_timeout", &self.callback_timeout)
            .finish()
    }
}

impl GrantConfig {
    /// Create a configuration with the defaults for `client_id`.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: format!("http://localhost:{}", DEFAULT_CALLBACK_PORT),
            local_callback_port: DEFAULT_CALLBACK_PORT,
            token_storage_location: PathBuf::from(DEFAULT_TOKEN_FILE),
            grant_variant: GrantVariant::default(),
            api_base_url: API_BASE_URL.to_string(),
            scopes: String::new(),
            callback_timeout: None,
        }
    }

    /// Read configuration from `PLAYERDATA_*` environment variables.
    ///
    /// `PLAYERDATA_CLIENT_ID` is required. `PLAYERDATA_CLIENT_SECRET`,
    /// `PLAYERDATA_REDIRECT_URI`, `PLAYERDATA_PORT`, `PLAYERDATA_TOKEN_FILE`,
    /// `PLAYERDATA_GRANT_TYPE` and `PLAYERDATA_API_BASE_URL` override defaults.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AuthError> {
        let client_id = lookup("PLAYERDATA_CLIENT_ID")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AuthError::Configuration("PLAYERDATA_CLIENT_ID is not set".into()))?;

        let mut config = Self::new(client_id);

        if let Some(secret) = lookup("PLAYERDATA_CLIENT_SECRET").filter(|v| !v.is_empty()) {
            config = config.with_client_secret(secret);
        }
        if let Some(port) = lookup("PLAYERDATA_PORT") {
            let port: u16 = port.parse().map_err(|_| {
                AuthError::Configuration(format!("PLAYERDATA_PORT is not a port: {port}"))
            })?;
            config = config.with_callback_port(port);
        }
        if let Some(uri) = lookup("PLAYERDATA_REDIRECT_URI") {
            config = config.with_redirect_uri(uri);
        }
        if let Some(path) = lookup("PLAYERDATA_TOKEN_FILE") {
            config = config.with_token_storage(path);
        }
        if let Some(variant) = lookup("PLAYERDATA_GRANT_TYPE") {
            config = config.with_grant_variant(variant.parse()?);
        }
        if let Some(base) = lookup("PLAYERDATA_API_BASE_URL") {
            config = config.with_api_base_url(base);
        }

        Ok(config)
    }

    /// Set the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Set the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// Set the callback port. Also points the redirect URI at it when the
    /// redirect URI still has its default value.
    #[must_use]
    pub fn with_callback_port(mut self, port: u16) -> Self {
        if self.redirect_uri == format!("http://localhost:{}", self.local_callback_port) {
            self.redirect_uri = format!("http://localhost:{}", port);
        }
        self.local_callback_port = port;
        self
    }

    /// Set the token file location.
    #[must_use]
    pub fn with_token_storage(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_storage_location = path.into();
        self
    }

    /// Set the grant variant.
    #[must_use]
    pub fn with_grant_variant(mut self, variant: GrantVariant) -> Self {
        self.grant_variant = variant;
        self
    }

    /// Set the API base URL.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set OAuth scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = scopes.into();
        self
    }

    /// Give up on the browser callback after `timeout`.
    #[must_use]
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = Some(timeout);
        self
    }

    /// Authorization endpoint.
    pub fn authorize_url(&self) -> String {
        format!("{}/oauth/authorize", self.api_base_url.trim_end_matches('/'))
    }

    /// Token endpoint.
    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.api_base_url.trim_end_matches('/'))
    }

    /// GraphQL endpoint.
    pub fn graphql_url(&self) -> String {
        format!("{}/api/graphql", self.api_base_url.trim_end_matches('/'))
    }

    /// Client secret, treating an empty string as absent.
    pub fn secret(&self) -> Option<&str> {
        self.client_secret.as_deref().filter(|s| !s.is_empty())
    }
}
