// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawning, signalling, and probing the `ojd` process from the CLI side.
//!
//! The CLI never talks to the daemon's internals directly — it finds the
//! `ojd` binary, spawns it detached, and afterwards only touches the same
//! PID file and log file the daemon itself writes under its state dir.

use anyhow::{anyhow, Result};
use oj_daemon::Config;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

/// Start `ojd` in the background, returning the child process handle.
pub fn start_daemon_background() -> Result<std::process::Child> {
    let ojd_path = resolve_ojd_binary()?;
    Command::new(&ojd_path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| anyhow!("failed to start {}: {e}", ojd_path.display()))
}

/// Find the `ojd` binary: explicit override, then a dev build sibling when
/// the CLI itself is a debug build, then a sibling of the running exe,
/// falling back to a bare `ojd` resolved via `PATH`.
pub fn resolve_ojd_binary() -> Result<PathBuf> {
    if let Some(path) = crate::env::daemon_binary() {
        return Ok(PathBuf::from(path));
    }

    let current_exe = std::env::current_exe().ok();

    let is_debug_build = current_exe
        .as_ref()
        .and_then(|p| p.to_str())
        .map(|s| s.contains("target/debug"))
        .unwrap_or(false);

    if is_debug_build {
        if let Some(manifest_dir) = crate::env::cargo_manifest_dir() {
            let dev_path = PathBuf::from(manifest_dir)
                .parent()
                .and_then(|p| p.parent())
                .map(|p| p.join("target/debug/ojd"));
            if let Some(path) = dev_path {
                if path.exists() {
                    return Ok(path);
                }
            }
        }
    }

    if let Some(ref exe) = current_exe {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("ojd");
            if sibling.exists() {
                return Ok(sibling);
            }
        }
    }

    Ok(PathBuf::from("ojd"))
}

/// Read the PID the daemon wrote to its lock file, if any.
pub fn read_daemon_pid(config: &Config) -> Option<u32> {
    std::fs::read_to_string(&config.lock_path).ok()?.trim().parse().ok()
}

/// Remove a stale PID file left behind by a daemon that is no longer running.
pub fn cleanup_stale_pid(config: &Config) {
    let _ = std::fs::remove_file(&config.lock_path);
}

fn kill_signal(signal: &str, pid: u32) -> bool {
    Command::new("kill")
        .args([signal, &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn process_exists(pid: u32) -> bool {
    kill_signal("-0", pid)
}

pub fn send_terminate(pid: u32) -> bool {
    kill_signal("-15", pid)
}

pub fn force_kill(pid: u32) -> bool {
    kill_signal("-9", pid)
}

/// Poll until `pid` is gone or `timeout` elapses. Returns whether it exited.
pub async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

const STARTUP_MARKER_PREFIX: &str = "--- ojd: starting (pid: ";

/// Read the daemon log from the most recent startup marker, looking for
/// error lines logged during that boot attempt.
pub fn read_startup_error(config: &Config) -> Option<String> {
    let content = std::fs::read_to_string(&config.log_path).ok()?;
    parse_startup_error(&content)
}

fn parse_startup_error(content: &str) -> Option<String> {
    let start_pos = content.rfind(STARTUP_MARKER_PREFIX)?;
    let startup_log = &content[start_pos..];

    let errors: Vec<&str> = startup_log
        .lines()
        .filter(|line| line.contains(" ERROR ") || line.contains("Failed to start"))
        .collect();

    if errors.is_empty() {
        return None;
    }

    let error_messages: Vec<String> = errors
        .iter()
        .filter_map(|line| line.split_once(": ").map(|(_, msg)| msg.to_string()))
        .collect();

    if error_messages.is_empty() {
        Some(errors.join("\n"))
    } else {
        Some(error_messages.join("\n"))
    }
}

#[cfg(test)]
#[path = "daemon_process_tests.rs"]
mod tests;
