//! OAuth2 token lifecycle for the PlayerData GraphQL API.
//!
//! This crate acquires, caches and supplies bearer tokens:
//!
//! - [`TokenStore`] - persists one [`TokenRecord`] ([`FileTokenStore`] by default)
//! - [`CallbackListener`] - local HTTP endpoint that catches the login redirect
//! - [`GrantFlow`] - runs a client-credentials, authorization-code or PKCE grant
//! - [`AuthSession`] - loads the cached token or logs in, and hands out the bearer string
//!
//! ## Example
//!
//! ```rust,ignore
//! use playerdata_auth::{AuthSession, GrantConfig, GrantVariant};
//!
//! let config = GrantConfig::new("my-client-id")
//!     .with_client_secret("my-secret")
//!     .with_grant_variant(GrantVariant::ClientCredentials);
//!
//! let session = AuthSession::connect(config).await?;
//! let header = session.authorization_header()?;
//! ```
//!
//! ## Token refresh
//!
//! Tokens are checked for expiry only when a session is built. A token that
//! expires while the session is in use is the transport's problem: on a 401 it
//! calls [`AuthSession::refresh`] and retries.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod browser;
pub mod config;
pub mod error;
pub mod flow;
pub mod listener;
pub mod pending;
pub mod session;
pub mod store;
pub mod token;

pub use browser::{BoxedBrowser, BrowserLauncher, PrintUrl, SystemBrowser};
pub use config::{GrantConfig, GrantVariant, API_BASE_URL, DEFAULT_CALLBACK_PORT};
pub use error::{AuthError, Result};
pub use flow::GrantFlow;
pub use listener::{CallbackListener, ListenerError, ShutdownHandle};
pub use pending::{PendingAuthorization, PkcePair};
pub use session::AuthSession;
pub use store::{
    BoxedTokenStore, FileTokenStore, InMemoryTokenStore, StoreError, TokenStore,
    DEFAULT_TOKEN_FILE,
};
pub use token::TokenRecord;
