//! Lists a club's sessions from the last 30 days.
//!
//! Run with:
//! ```bash
//! PLAYERDATA_CLIENT_ID=... PLAYERDATA_CLIENT_SECRET=... \
//! PLAYERDATA_GRANT_TYPE=client_credentials CLUB_ID=... \
//! RUST_LOG=playerdata=debug cargo run --example quick_start
//! ```

use anyhow::Context;
use chrono::{Duration, Utc};
use playerdata::prelude::*;
use tracing_subscriber::EnvFilter;

const CLUB_SESSIONS: &str = r#"
query ClubSessions($clubIdEq: ID!, $startTimeGteq: ISO8601DateTime, $endTimeLteq: ISO8601DateTime) {
  sessions(filter: {clubIdEq: $clubIdEq, startTimeGteq: $startTimeGteq, endTimeLteq: $endTimeLteq}) {
    id
    startTime
    endTime
  }
}
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let club_id = std::env::var("CLUB_ID").context("CLUB_ID is not set")?;
    let config = GrantConfig::from_env()?;
    let api = PlayerDataApi::connect(config).await?;

    let now = Utc::now();
    let month_ago = now - Duration::days(30);

    let data = api
        .run_query(
            "ClubSessions",
            CLUB_SESSIONS,
            Some(serde_json::json!({
                "clubIdEq": club_id,
                "startTimeGteq": month_ago.to_rfc3339(),
                "endTimeLteq": now.to_rfc3339(),
            })),
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&data["sessions"])?);
    Ok(())
}
