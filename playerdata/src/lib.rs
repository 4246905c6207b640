//! # PlayerData - GraphQL client for the PlayerData API
//!
//! Authenticated access to `https://app.playerdata.co.uk/api/graphql`. Tokens
//! are obtained with one of three OAuth2 grants, cached on disk and attached as
//! a bearer credential to every request.
//!
//! ## Quick Start
//!
//! ```ignore
//! use playerdata::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let api = PlayerDataApi::connect(GrantConfig::from_env()?).await?;
//!
//!     let data = api
//!         .run_query(
//!             "Session",
//!             "query Session($id: ID!) { session(id: $id) { id startTime endTime } }",
//!             Some(serde_json::json!({"id": "an_example_session_id"})),
//!         )
//!         .await?;
//!     println!("{}", data["session"]);
//!     Ok(())
//! }
//! ```
//!
//! ## Grants
//!
//! | Variant | Needs secret | Interactive |
//! |---------|--------------|-------------|
//! | `ClientCredentials` | yes | no |
//! | `AuthorizationCode` | yes | browser + local callback |
//! | `AuthorizationCodePkce` | no | browser + local callback |
//!
//! The interactive grants open the authorization page and listen on
//! `localhost:8888` (configurable) for the redirect.
//!
//! ## Architecture
//!
//! - [`playerdata_auth`] - token storage, callback listener, grant flows and sessions
//! - [`client`] - GraphQL transport with 401-driven token refresh
//! - [`api`] - the [`PlayerDataApi`] entry point

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod api;
pub mod client;
pub mod error;

/// Token lifecycle: storage, grants and sessions.
pub use playerdata_auth as auth;

pub use api::PlayerDataApi;
pub use client::{GraphqlClient, GraphqlRequest, GraphqlResponse};
pub use error::{ApiError, ApiResult, GraphQLError};

pub use playerdata_auth::{
    AuthError, AuthSession, FileTokenStore, GrantConfig, GrantFlow, GrantVariant,
    InMemoryTokenStore, TokenRecord, TokenStore, API_BASE_URL,
};

/// Common imports.
pub mod prelude {
    // Entry point
    pub use crate::api::PlayerDataApi;

    // Transport
    pub use crate::client::{GraphqlClient, GraphqlRequest, GraphqlResponse};
    pub use crate::error::{ApiError, ApiResult, GraphQLError};

    // Auth
    pub use crate::auth::{
        AuthError, AuthSession, BrowserLauncher, FileTokenStore, GrantConfig, GrantFlow,
        GrantVariant, InMemoryTokenStore, PrintUrl, SystemBrowser, TokenRecord, TokenStore,
    };
}

/// Returns the current version of the crate.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
