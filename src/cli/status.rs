//! CLI handler for querying the running service.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::config::Config;

pub async fn handle_status_command() -> Result<()> {
    let config = Config::load()?;
    let base_url = format!("http://127.0.0.1:{}", config.api.port);

    let response = reqwest::get(format!("{}/state", base_url))
        .await
        .context("Failed to reach the Meetsync service. Is it running?")?;

    let status = response.status();
    let json: Value = response.json().await?;

    if !status.is_success() {
        bail!(
            "Service reported an error: {}",
            json.get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error")
        );
    }

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
