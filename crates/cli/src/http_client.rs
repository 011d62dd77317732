// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The CLI's only way of talking to a running daemon: a handful of GET
//! requests against the same HTTP surface any other client uses, using the
//! same basic-auth credentials the daemon was configured with.

use anyhow::{anyhow, Result};
use oj_daemon::Config;
use serde_json::Value;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

fn base_url(config: &Config) -> String {
    let addr = config.bind_addr;
    let host = if addr.ip().is_unspecified() { "127.0.0.1".to_string() } else { addr.ip().to_string() };
    format!("http://{host}:{}", addr.port())
}

async fn get(config: &Config, path: &str) -> Result<reqwest::Response> {
    let url = format!("{}{path}", base_url(config));
    reqwest::Client::new()
        .get(url)
        .basic_auth(&config.login_username, Some(&config.login_password))
        .timeout(PROBE_TIMEOUT)
        .send()
        .await
        .map_err(|e| anyhow!("could not reach daemon: {e}"))
}

/// Succeeds only if the daemon answers `/` with a 2xx status.
pub async fn probe_liveness(config: &Config) -> Result<()> {
    let resp = get(config, "/").await?;
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(anyhow!("daemon returned {}", resp.status()))
    }
}

/// Fetch `/status/system` as a raw JSON value.
pub async fn fetch_system_status(config: &Config) -> Result<Value> {
    let resp = get(config, "/status/system").await?;
    if !resp.status().is_success() {
        return Err(anyhow!("daemon returned {}", resp.status()));
    }
    resp.json().await.map_err(|e| anyhow!("invalid response from daemon: {e}"))
}
