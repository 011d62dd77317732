// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Odd Jobs Daemon (ojd)
//!
//! Background HTTP process that owns the transcription job queue and
//! dispatches work to whisper subprocesses.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod http;
mod lifecycle;

use std::sync::Arc;
use std::time::Duration;

use oj_adapters::SelfCareGate;
use oj_core::UuidIdGen;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::config::Config;
use crate::lifecycle::{Daemon, LifecycleError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("ojd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("ojd {}", env!("CARGO_PKG_VERSION"));
                println!("Odd Jobs Daemon - transcription job server");
                println!();
                println!("USAGE:");
                println!("    ojd");
                println!();
                println!("The daemon is typically started by the `oj` CLI and should not");
                println!("be invoked directly. It serves the HTTP API described in the");
                println!("project's external interface documentation.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: ojd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;

    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config)?;
    let log_guard = setup_logging(&config)?;

    info!("starting daemon");

    let runtime = tokio::runtime::Handle::current();
    let daemon = match Daemon::startup(config.clone(), runtime) {
        Ok(d) => d,
        Err(LifecycleError::LockHeld(lock_path)) => {
            let pid = std::fs::read_to_string(&lock_path).unwrap_or_default().trim().to_string();
            eprintln!("ojd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            write_startup_error(&config, &e);
            error!(error = %e, "failed to start daemon");
            drop(log_guard);
            return Err(e.into());
        }
    };

    let state = http::AppState {
        store: daemon.store.clone(),
        cancel_registry: daemon.cancel_registry.clone(),
        clock: daemon.clock.clone(),
        self_care: Arc::new(SelfCareGate::new(config.data_dir.clone())),
        id_gen: http::IdSource::Uuid(UuidIdGen),
        data_dir: config.data_dir.clone(),
        login_username: config.login_username.clone(),
        login_password: config.login_password.clone(),
        parallel_workers: config.parallel_workers,
        running_jobs: daemon.running_jobs.clone(),
    };

    let listener = TcpListener::bind(config.bind_addr).await?;
    let bound_addr = listener.local_addr()?;
    let app = http::router(state);

    spawn_checkpoint_task(daemon.store.clone());
    spawn_sync_task(daemon.store.clone());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(addr = %bound_addr, "daemon ready");
    println!("READY");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!(error = %e, "http server exited with error");
            }
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
        }
    }

    daemon.shutdown();
    info!("daemon stopped");
    Ok(())
}

/// How often the background checkpoint task compresses the materialized
/// state into a fresh snapshot and truncates the WAL behind it.
const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);

fn spawn_checkpoint_task(store: Arc<oj_storage::Store>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHECKPOINT_INTERVAL);
        loop {
            interval.tick().await;
            let store = store.clone();
            let result = tokio::task::spawn_blocking(move || store.checkpoint_sync()).await;
            match result {
                Ok(Ok(r)) => tracing::debug!(seq = r.seq, size_bytes = r.size_bytes, "checkpoint complete"),
                Ok(Err(e)) => tracing::warn!(error = %e, "checkpoint failed"),
                Err(e) => tracing::warn!(error = %e, "checkpoint task panicked"),
            }
        }
    });
}

/// Group-commit flush window: the WAL is already flushed synchronously on
/// every mutating `Store` call, so this is a cheap idempotent backstop, not
/// a load-bearing durability mechanism.
const SYNC_INTERVAL: Duration = Duration::from_millis(10);

fn spawn_sync_task(store: Arc<oj_storage::Store>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SYNC_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = store.sync() {
                tracing::error!(error = %e, "failed to sync store");
            }
        }
    });
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `daemon.log` → `daemon.log.1` → `daemon.log.2` → `daemon.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently ignored
/// so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Startup marker prefix written to log before anything else.
const STARTUP_MARKER_PREFIX: &str = "--- ojd: starting (pid: ";

fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&config.log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&config.log_path) else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start daemon: {error}");
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        config.log_path.file_name().ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
