// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Store`: the single shared-mutable-state facade. Every mutation goes
//! through one of these methods, which appends a [`StoreEvent`] to the WAL,
//! flushes it, and applies it to the in-memory [`MaterializedState`] before
//! returning — so a caller that gets `Ok` back knows the change is durable.
//!
//! Safe to call concurrently from the HTTP handler tasks, the scheduler
//! thread, and worker threads: everything funnels through one `Mutex`.

use crate::checkpoint::{load_snapshot, CheckpointResult, Checkpointer};
use crate::state::MaterializedState;
use crate::wal::Wal;
use crate::Snapshot;
use oj_core::{CoreError, Entry, EntryField, EntryId, Module, ModuleId, StoreEvent};
use parking_lot::{Condvar, Mutex};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Wal(#[from] crate::wal::WalError),
    #[error(transparent)]
    Snapshot(#[from] crate::snapshot::SnapshotError),
    #[error(transparent)]
    Core(#[from] CoreError),
}

struct Inner {
    state: MaterializedState,
    wal: Wal,
}

pub struct Store {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    data_dir: PathBuf,
}

fn wal_path(data_dir: &Path) -> PathBuf {
    data_dir.join("wal.jsonl")
}

fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join("snapshot.zst")
}

impl Store {
    /// Open (or initialize) the store at `data_dir`: load the latest
    /// snapshot if one exists, replay the WAL past it, then run startup
    /// crash recovery (`Processing` entries reset to `Queued` at priority
    /// zero). Returns the store plus the uids that were reset, so the
    /// caller can log them.
    pub fn open(data_dir: &Path, now: i64) -> Result<(Self, Vec<EntryId>), StoreError> {
        std::fs::create_dir_all(data_dir)?;

        let snapshot = load_snapshot(&snapshot_path(data_dir))?;
        let (seq, mut state) = match snapshot {
            Some(Snapshot { seq, state, .. }) => (seq, state),
            None => (0, MaterializedState::default()),
        };

        let mut wal = Wal::open(&wal_path(data_dir), seq)?;
        let replay = wal.entries_after(seq)?;
        let mut last_seq = seq;
        for entry in &replay {
            state.apply_event(&entry.event);
            last_seq = last_seq.max(entry.seq);
        }
        wal.mark_processed(last_seq);

        let reset = state.reconstruct_on_startup(now);
        for uid in &reset {
            wal.append(&StoreEvent::JobUpdated {
                uid: uid.clone(),
                fields: vec![EntryField::Status(oj_core::EntryStatus::Queued), EntryField::Priority(0)],
                updated_at: now,
            })?;
            wal.append(&StoreEvent::Enqueued {
                uid: uid.clone(),
                priority: 0,
                added_at: now,
            })?;
        }
        wal.flush()?;
        wal.mark_processed(wal.write_seq());

        let store = Self {
            inner: Mutex::new(Inner { state, wal }),
            not_empty: Condvar::new(),
            data_dir: data_dir.to_owned(),
        };
        Ok((store, reset))
    }

    fn commit(&self, inner: &mut Inner, events: &[StoreEvent]) -> Result<(), StoreError> {
        for event in events {
            let seq = inner.wal.append(event)?;
            inner.wal.mark_processed(seq);
        }
        inner.wal.flush()?;
        for event in events {
            inner.state.apply_event(event);
        }
        Ok(())
    }

    pub fn add_module(&self, module: Module) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.commit(&mut inner, &[StoreEvent::ModuleAdded { module }])
    }

    pub fn get_module(&self, module_uid: &str) -> Option<Module> {
        self.inner.lock().state.get_module(module_uid).cloned()
    }

    /// Adjust a module's `queued_or_active` counter by `delta` (positive on
    /// submission, negative once an entry leaves the active set).
    pub fn update_module_counters(
        &self,
        module_uid: &ModuleId,
        delta: i32,
        now: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let module = inner
            .state
            .get_module(module_uid.as_str())
            .ok_or_else(|| CoreError::NotFound(format!("module {module_uid}")))?;
        let queued_or_active = (module.queued_or_active as i64 + delta as i64).max(0) as u32;
        self.commit(
            &mut inner,
            &[StoreEvent::ModuleCountersUpdated {
                module_uid: module_uid.clone(),
                queued_or_active,
                updated_at: now,
            }],
        )
    }

    pub fn add_job(&self, entry: Entry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.commit(&mut inner, &[StoreEvent::JobAdded { entry }])
    }

    pub fn load_job(&self, uid: &str) -> Option<Entry> {
        self.inner.lock().state.get_job(uid).cloned()
    }

    pub fn exists_job(&self, uid: &str) -> bool {
        self.inner.lock().state.get_job(uid).is_some()
    }

    pub fn delete_job(&self, uid: &EntryId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.commit(&mut inner, &[StoreEvent::JobDeleted { uid: uid.clone() }])
    }

    pub fn update_job(&self, uid: &EntryId, fields: Vec<EntryField>, now: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.state.get_job(uid.as_str()).is_none() {
            return Err(CoreError::NotFound(format!("job {uid}")).into());
        }
        self.commit(
            &mut inner,
            &[StoreEvent::JobUpdated {
                uid: uid.clone(),
                fields,
                updated_at: now,
            }],
        )
    }

    /// Admit and queue a freshly-built entry in one atomic step: checks the
    /// owning module's cap, and if it admits, records `JobAdded`,
    /// `Enqueued`, and the module counter bump together. Returns `Ok(false)`
    /// (not an error) when the module rejects on capacity, so HTTP callers
    /// can map that straight to a 429/409 without inspecting error variants.
    pub fn submit_entry(&self, entry: Entry) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let module = inner
            .state
            .get_module(entry.module_uid.as_str())
            .ok_or_else(|| CoreError::NotFound(format!("module {}", entry.module_uid)))?;
        if !module.admits_one_more() {
            return Ok(false);
        }
        let module_uid = entry.module_uid.clone();
        let uid = entry.uid.clone();
        let priority = entry.priority;
        let added_at = entry.created_at;
        let queued_or_active = module.queued_or_active + 1;
        self.commit(
            &mut inner,
            &[
                StoreEvent::JobAdded { entry },
                StoreEvent::Enqueued { uid, priority, added_at },
                StoreEvent::ModuleCountersUpdated {
                    module_uid,
                    queued_or_active,
                    updated_at: added_at,
                },
            ],
        )?;
        drop(inner);
        self.not_empty.notify_one();
        Ok(true)
    }

    pub fn enqueue(&self, uid: &EntryId, priority: i32, now: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.commit(
            &mut inner,
            &[StoreEvent::Enqueued {
                uid: uid.clone(),
                priority,
                added_at: now,
            }],
        )?;
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    pub fn remove_from_queue(&self, uid: &EntryId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.commit(&mut inner, &[StoreEvent::Dequeued { uid: uid.clone() }])
    }

    /// Block up to `timeout` for the next queued entry in dispatch order
    /// (lowest priority number first, then earliest `added_at`). Removes it
    /// from the queue and returns its current snapshot; the caller
    /// (scheduler) is responsible for transitioning its status.
    pub fn dequeue(&self, timeout: Duration) -> Option<Entry> {
        let mut inner = self.inner.lock();
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let order = inner.state.queue_in_order();
            if let Some(uid) = order.into_iter().next() {
                let entry = inner.state.get_job(uid.as_str()).cloned();
                if self
                    .commit(&mut inner, &[StoreEvent::Dequeued { uid }])
                    .is_err()
                {
                    return None;
                }
                return entry;
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return None;
            }
            let wait_result = self.not_empty.wait_for(&mut inner, deadline - now);
            if wait_result.timed_out() && inner.state.queue_in_order().is_empty() {
                return None;
            }
        }
    }

    /// Snapshot of everything needed to rebuild in-memory state at startup:
    /// all modules, all jobs, and the queue in dispatch order.
    pub fn load_all(&self) -> (Vec<Module>, Vec<Entry>, Vec<EntryId>) {
        let inner = self.inner.lock();
        let modules = inner.state.modules.values().cloned().collect();
        let jobs = inner.state.jobs.values().cloned().collect();
        let queue = inner.state.queue_in_order();
        (modules, jobs, queue)
    }

    pub fn stats(&self) -> crate::state::StatusCounts {
        self.inner.lock().state.stats()
    }

    pub fn active_count_for_module(&self, module_uid: &str) -> u32 {
        self.inner.lock().state.active_count_for_module(module_uid)
    }

    /// Force the WAL's buffered writes to disk. A no-op if nothing is
    /// buffered (every mutating call above already flushes on its own, so
    /// this only matters if a future caller batches appends).
    pub fn sync(&self) -> Result<(), StoreError> {
        Ok(self.inner.lock().wal.flush()?)
    }

    /// Take a consistent `(seq, state)` pair for a background checkpoint.
    /// Pass the result to a [`Checkpointer`] off this lock; call
    /// [`Store::complete_checkpoint`] once the write is durable.
    pub fn begin_checkpoint(&self) -> (u64, MaterializedState) {
        let inner = self.inner.lock();
        (inner.wal.write_seq(), inner.state.clone())
    }

    /// Truncate the WAL up to `seq` now that a checkpoint covering it is
    /// durable on disk. Never call this before the checkpoint's `wait()`
    /// (or sync equivalent) has returned successfully.
    pub fn complete_checkpoint(&self, seq: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.wal.mark_processed(seq);
        inner.wal.truncate_before(seq)?;
        Ok(())
    }

    pub fn checkpointer(&self) -> Checkpointer {
        Checkpointer::new(snapshot_path(&self.data_dir))
    }

    /// Synchronous checkpoint + truncate, used only at clean shutdown.
    pub fn checkpoint_sync(&self) -> Result<CheckpointResult, StoreError> {
        let (seq, state) = self.begin_checkpoint();
        let result = self.checkpointer().checkpoint_sync(seq, &state).map_err(|e| {
            CoreError::EngineFailure(format!("checkpoint failed: {e}"))
        })?;
        self.complete_checkpoint(seq)?;
        Ok(result)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
