// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `oj status` - report whether the daemon is up and, if so, its load

use anyhow::{anyhow, Result};
use oj_daemon::Config;

use crate::http_client::fetch_system_status;

pub async fn status(json: bool) -> Result<()> {
    let config = Config::load().map_err(|e| anyhow!(e))?;

    match fetch_system_status(&config).await {
        Ok(body) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                let disk_pct = body["disk_usage_ratio"].as_f64().unwrap_or(0.0) * 100.0;
                println!("Daemon running");
                println!("  queue length:  {}", body["queue_length"]);
                println!("  running jobs:  {}/{}", body["running_jobs"], body["parallel_jobs"]);
                println!("  disk usage:    {disk_pct:.1}%");
                println!("  ram usage:     {:.1}%", body["ram_usage_percent"].as_f64().unwrap_or(0.0));
                println!("  cpu usage:     {:.1}%", body["cpu_usage_percent"].as_f64().unwrap_or(0.0));
            }
            Ok(())
        }
        Err(_) => {
            if json {
                println!(r#"{{ "status": "not_running" }}"#);
            } else {
                println!("Daemon not running");
            }
            Ok(())
        }
    }
}
