// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup and shutdown: acquire the exclusive lock, open the store
//! (replaying the WAL and resetting any `Processing` job left behind by a
//! crash), spawn the scheduler, and on the way out cancel every in-flight
//! job, wait out a grace window, and checkpoint one last time before the
//! lock is released.

use crate::config::Config;
use fs2::FileExt;
use oj_core::{Clock, Module, ModuleId, DEFAULT_FILE_MODULE_ID};
use oj_engine::{CancelRegistry, Scheduler, TranscriberConfig, WorkerConfig};
use oj_storage::Store;
use std::fs::File;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not resolve a state directory: set OJ_STATE_DIR or HOME")]
    NoStateDir,
    #[error("daemon already running (lock held at {0})")]
    LockHeld(std::path::PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] oj_storage::StoreError),
}

/// Everything the running daemon holds for its lifetime. Dropping this
/// releases the lock file.
pub struct Daemon {
    pub config: Config,
    pub store: Arc<Store>,
    pub cancel_registry: Arc<CancelRegistry>,
    pub clock: Arc<dyn Clock>,
    pub running_jobs: Arc<AtomicUsize>,
    scheduler: Option<Scheduler>,
    _lock_file: File,
}

impl Daemon {
    /// Acquire the lock, open the store, bootstrap the default file module,
    /// and spawn the scheduler thread. `runtime` is the tokio handle the
    /// scheduler hands dispatched jobs to.
    pub fn startup(config: Config, runtime: tokio::runtime::Handle) -> Result<Self, LifecycleError> {
        std::fs::create_dir_all(&config.data_dir)?;

        let lock_file = File::create(&config.lock_path)?;
        lock_file.try_lock_exclusive().map_err(|_| LifecycleError::LockHeld(config.lock_path.clone()))?;
        std::fs::write(&config.lock_path, std::process::id().to_string())?;
        std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

        let clock: Arc<dyn Clock> = Arc::new(oj_core::SystemClock);
        let now = clock.epoch_secs();

        let (store, reset) = Store::open(&config.data_dir, now)?;
        let store = Arc::new(store);
        if !reset.is_empty() {
            warn!(count = reset.len(), uids = ?reset, "reset in-flight jobs to queued after restart");
        }

        if store.get_module(DEFAULT_FILE_MODULE_ID).is_none() {
            store.add_module(Module::new_file(ModuleId::new(DEFAULT_FILE_MODULE_ID), now))?;
        }

        let cancel_registry = Arc::new(CancelRegistry::new());
        let worker_config = Arc::new(WorkerConfig {
            data_dir: config.data_dir.clone(),
            transcriber: TranscriberConfig {
                whisper_binary: config.whisper_binary.clone(),
                models_dir: config.models_dir.clone(),
                whisper_model: config.whisper_model.clone(),
                whisper_cpu_threads: config.whisper_cpu_threads,
            },
        });

        let scheduler = Scheduler::spawn(
            store.clone(),
            cancel_registry.clone(),
            clock.clone(),
            worker_config,
            config.parallel_workers,
            runtime,
        );
        let running_jobs = scheduler.active_counter();

        info!(parallel_workers = config.parallel_workers, addr = %config.bind_addr, "daemon ready");

        Ok(Self {
            config,
            store,
            cancel_registry,
            clock,
            running_jobs,
            scheduler: Some(scheduler),
            _lock_file: lock_file,
        })
    }

    /// Cancel every in-flight job for requeue, wait up to `shutdown_grace`
    /// for the workers to unwind, checkpoint synchronously, and remove the
    /// pid/version files. The lock itself is released when `self` drops.
    pub fn shutdown(mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }

        let requeued = self.cancel_registry.cancel_all_for_shutdown();
        if !requeued.is_empty() {
            info!(count = requeued.len(), "requesting cancellation for in-flight jobs");
        }

        let deadline = Instant::now() + self.config.shutdown_grace;
        while !self.cancel_registry.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }
        if !self.cancel_registry.is_empty() {
            warn!("shutdown grace window elapsed with workers still unwinding");
        }

        match self.store.checkpoint_sync() {
            Ok(result) => info!(seq = result.seq, bytes = result.size_bytes, "final checkpoint written"),
            Err(e) => warn!(error = %e, "final checkpoint failed"),
        }

        let _ = std::fs::remove_file(&self.config.lock_path);
        let _ = std::fs::remove_file(&self.config.version_path);
        info!("daemon shut down");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
