// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration, loaded entirely from the environment per the
//! server's deployment contract — there is no config file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory: `wal/`, `snapshot.zst`, `models/`, `audioInput/`.
    pub data_dir: PathBuf,
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    pub models_dir: PathBuf,
    pub whisper_binary: PathBuf,

    pub bind_addr: SocketAddr,
    pub login_username: String,
    pub login_password: String,

    pub whisper_model: String,
    pub whisper_cpu_threads: u32,
    pub parallel_workers: usize,

    /// How long shutdown waits for in-flight jobs to cancel and requeue
    /// before the process exits out from under them.
    pub shutdown_grace: Duration,

    /// `tracing_subscriber::EnvFilter` directive string, from `log`.
    pub log_filter: String,
}

impl Config {
    pub fn load() -> Result<Self, LifecycleError> {
        let data_dir = data_dir()?;

        Ok(Self {
            lock_path: data_dir.join("daemon.pid"),
            version_path: data_dir.join("daemon.version"),
            log_path: data_dir.join("daemon.log"),
            models_dir: data_dir.join("models"),
            whisper_binary: whisper_binary(),
            bind_addr: bind_addr(),
            login_username: env_or("login_username", "admin"),
            login_password: env_or("login_password", "admin"),
            whisper_model: env_or("whisper_model", "tiny"),
            whisper_cpu_threads: env_parse_or("whisper_cpu_threads", 4),
            parallel_workers: env_parse_or("parallel_workers", 2),
            shutdown_grace: Duration::from_secs(env_parse_or("shutdown_grace_secs", 10)),
            log_filter: env_or("log", "info"),
            data_dir,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn whisper_binary() -> PathBuf {
    std::env::var("OJ_WHISPER_BINARY")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("whisper-cli"))
}

fn bind_addr() -> SocketAddr {
    std::env::var("OJ_HTTP_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| "0.0.0.0:5000".parse().expect("static fallback address is valid"))
}

/// Resolve the data directory: `OJ_STATE_DIR` > `XDG_STATE_HOME/oj` >
/// `~/.local/state/oj`.
fn data_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("OJ_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("oj"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/oj"))
}
