// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `oj stop` - stop the daemon (graceful first, then forceful)

use anyhow::{anyhow, Result};
use oj_daemon::Config;
use std::time::Duration;

use crate::daemon_process::{
    cleanup_stale_pid, force_kill, process_exists, read_daemon_pid, send_terminate, wait_for_exit,
};

const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(12);
const FORCE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn stop() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow!(e))?;

    let Some(pid) = read_daemon_pid(&config) else {
        println!("Daemon not running");
        return Ok(());
    };

    if !process_exists(pid) {
        cleanup_stale_pid(&config);
        println!("Daemon not running");
        return Ok(());
    }

    send_terminate(pid);
    if !wait_for_exit(pid, GRACEFUL_TIMEOUT).await {
        force_kill(pid);
        wait_for_exit(pid, FORCE_TIMEOUT).await;
    }

    cleanup_stale_pid(&config);
    println!("Daemon stopped");
    Ok(())
}
