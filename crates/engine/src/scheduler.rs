// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler: the single dispatch loop between the queue and the worker
//! pool. Runs on its own OS thread, not a tokio task, because it blocks on
//! `Queue::pop` — parking a real thread there is fine, parking a tokio
//! worker thread there would starve the runtime.
//!
//! Admission rule: while the number of jobs currently running (`R`) is at
//! least the configured parallelism (`P`), wait; otherwise pop the next
//! queued entry, transition it to `Prepared`, register its cancellation
//! token, and dispatch a worker task for it. Self-care is checked once, at
//! submission — the scheduler never re-checks it.

use crate::cancel::CancelRegistry;
use crate::queue::Queue;
use crate::worker::{self, WorkerConfig};
use oj_core::{Clock, EntryField, EntryStatus};
use oj_storage::Store;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// How long the scheduler thread blocks on an empty queue before re-checking
/// the running flag. Keeps shutdown latency bounded without busy-polling.
const POP_TIMEOUT: Duration = Duration::from_millis(500);

pub struct Scheduler {
    running: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the dispatch thread. `runtime` is used to hand each dispatched
    /// job to the tokio runtime as a task; `parallel_workers` bounds how many
    /// of those tasks may be running at once.
    pub fn spawn(
        store: Arc<Store>,
        cancel_registry: Arc<CancelRegistry>,
        clock: Arc<dyn Clock>,
        worker_config: Arc<WorkerConfig>,
        parallel_workers: usize,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let active = Arc::new(AtomicUsize::new(0));
        let queue = Queue::new(store.clone());

        let thread_running = running.clone();
        let thread_active = active.clone();
        let handle = std::thread::Builder::new()
            .name("oj-scheduler".to_string())
            .spawn(move || {
                dispatch_loop(
                    queue,
                    store,
                    cancel_registry,
                    clock,
                    worker_config,
                    parallel_workers,
                    runtime,
                    thread_running,
                    thread_active,
                )
            })
            .expect("failed to spawn scheduler thread");

        Self {
            running,
            active,
            handle: Some(handle),
        }
    }

    pub fn running_jobs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// A clone of the shared active-job counter, for callers (the HTTP
    /// surface) that need to read it without holding the `Scheduler` itself.
    pub fn active_counter(&self) -> Arc<AtomicUsize> {
        self.active.clone()
    }

    /// Signal the dispatch loop to stop admitting new work and join it.
    /// Jobs already dispatched are untouched here — the caller cancels
    /// those separately via the shared `CancelRegistry`.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch_loop(
    queue: Queue,
    store: Arc<Store>,
    cancel_registry: Arc<CancelRegistry>,
    clock: Arc<dyn Clock>,
    worker_config: Arc<WorkerConfig>,
    parallel_workers: usize,
    runtime: tokio::runtime::Handle,
    running: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
) {
    info!(parallel_workers, "scheduler dispatch loop starting");
    while running.load(Ordering::SeqCst) {
        if active.load(Ordering::SeqCst) >= parallel_workers {
            std::thread::sleep(Duration::from_millis(50));
            continue;
        }

        let Some(entry) = queue.pop(POP_TIMEOUT) else {
            continue;
        };

        let module = match store.get_module(entry.module_uid.as_str()) {
            Some(m) => m,
            None => {
                error!(job = %entry.uid, module = %entry.module_uid, "dispatched job references unknown module");
                continue;
            }
        };

        let now = clock.epoch_secs();
        if let Err(e) = store.update_job(&entry.uid, vec![EntryField::Status(EntryStatus::Prepared)], now) {
            error!(job = %entry.uid, error = %e, "failed to mark job prepared");
            continue;
        }

        let token = cancel_registry.register(entry.uid.clone());
        active.fetch_add(1, Ordering::SeqCst);

        let store = store.clone();
        let cancel_registry = cancel_registry.clone();
        let clock = clock.clone();
        let worker_config = worker_config.clone();
        let active_for_task = active.clone();
        let module_kind = module.kind;

        runtime.spawn(async move {
            worker::run_job(entry, module_kind, store, cancel_registry, token, clock, worker_config).await;
            active_for_task.fetch_sub(1, Ordering::SeqCst);
        });
    }
    info!("scheduler dispatch loop stopped");
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
