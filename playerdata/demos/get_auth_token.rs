//! Prints a client-credentials access token without touching the token file.
//!
//! Run with:
//! ```bash
//! PLAYERDATA_CLIENT_ID=... PLAYERDATA_CLIENT_SECRET=... cargo run --example get_auth_token
//! ```

use playerdata::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = GrantConfig::from_env()?.with_grant_variant(GrantVariant::ClientCredentials);
    let token = GrantFlow::new(config)?.exchange_client_credentials().await?;

    let access_token = token.access_token.ok_or(AuthError::MissingField("access_token"))?;
    println!("{access_token}");
    Ok(())
}
