// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `oj start` - start the daemon

use anyhow::{anyhow, Result};
use oj_daemon::Config;
use std::time::Duration;

use crate::daemon_process::{read_startup_error, start_daemon_background};
use crate::http_client::probe_liveness;
use crate::poll::{Poller, Tick};

const READY_TIMEOUT: Duration = Duration::from_secs(15);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub async fn start(foreground: bool) -> Result<()> {
    let config = Config::load().map_err(|e| anyhow!(e))?;

    if foreground {
        let ojd_path = crate::daemon_process::resolve_ojd_binary()?;
        let status = std::process::Command::new(&ojd_path).status()?;
        if !status.success() {
            return Err(anyhow!("daemon exited with status {status}"));
        }
        return Ok(());
    }

    if probe_liveness(&config).await.is_ok() {
        println!("Daemon already running");
        return Ok(());
    }

    start_daemon_background()?;

    let mut poller = Poller::new(POLL_INTERVAL, Some(READY_TIMEOUT));
    loop {
        if probe_liveness(&config).await.is_ok() {
            println!("Daemon started");
            return Ok(());
        }
        match poller.tick().await {
            Tick::Ready => continue,
            Tick::Timeout => {
                return Err(match read_startup_error(&config) {
                    Some(reason) => anyhow!("daemon failed to start: {reason}"),
                    None => anyhow!("daemon did not become ready within {READY_TIMEOUT:?}"),
                })
            }
            Tick::Interrupted => return Err(anyhow!("interrupted while waiting for daemon to start")),
        }
    }
}
