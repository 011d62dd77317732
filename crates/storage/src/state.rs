// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay: modules, job entries, and the
//! persisted queue references.

use oj_core::{apply_field, Entry, EntryId, EntryStatus, Module, StoreEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-status counts plus queue length, as returned by `Store::stats()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub queued: u64,
    pub prepared: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub canceled: u64,
    pub queue_length: u64,
}

/// A queue entry's ordering key, mirroring the `queue(id, job_uid, priority,
/// added_at)` relation described by the on-disk contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueRef {
    pub priority: i32,
    pub added_at: i64,
}

/// Materialized state built from WAL replay.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub modules: HashMap<String, Module>,
    pub jobs: HashMap<String, Entry>,
    /// `uid -> (priority, added_at)` for entries currently queued. A mirror
    /// of the in-memory priority queue, kept so a restart can rebuild it
    /// without touching the jobs map.
    pub queue_refs: HashMap<String, QueueRef>,
}

impl MaterializedState {
    pub fn get_job(&self, uid: &str) -> Option<&Entry> {
        self.jobs.get(uid)
    }

    pub fn get_module(&self, module_uid: &str) -> Option<&Module> {
        self.modules.get(module_uid)
    }

    /// Queue refs in dispatch order: priority ascending, then `added_at`
    /// ascending (FIFO within a priority).
    pub fn queue_in_order(&self) -> Vec<EntryId> {
        let mut items: Vec<(&String, &QueueRef)> = self.queue_refs.iter().collect();
        items.sort_by_key(|(_, q)| (q.priority, q.added_at));
        items.into_iter().map(|(uid, _)| EntryId::new(uid.clone())).collect()
    }

    pub fn stats(&self) -> StatusCounts {
        let mut counts = StatusCounts {
            queue_length: self.queue_refs.len() as u64,
            ..Default::default()
        };
        for entry in self.jobs.values() {
            match entry.status {
                EntryStatus::Queued => counts.queued += 1,
                EntryStatus::Prepared => counts.prepared += 1,
                EntryStatus::Processing => counts.processing += 1,
                EntryStatus::Completed => counts.completed += 1,
                EntryStatus::Failed => counts.failed += 1,
                EntryStatus::Canceled => counts.canceled += 1,
            }
        }
        counts
    }

    /// `module.queued_or_active` should always equal the count of entries
    /// for that module in `{Queued, Prepared, Processing}`. Used by tests
    /// and by the reconciliation pass to detect and repair drift.
    pub fn active_count_for_module(&self, module_uid: &str) -> u32 {
        self.jobs
            .values()
            .filter(|e| {
                e.module_uid.as_str() == module_uid
                    && matches!(
                        e.status,
                        EntryStatus::Queued | EntryStatus::Prepared | EntryStatus::Processing
                    )
            })
            .count() as u32
    }

    /// Apply a durable event to derive the next state.
    ///
    /// # Idempotency requirement
    ///
    /// All handlers here MUST be idempotent: the same event may be applied
    /// once immediately (for read-your-writes visibility to the caller) and
    /// again during WAL replay after a crash. Every branch below uses
    /// upsert/assignment rather than increment-on-missing, so replaying an
    /// already-applied event is a no-op.
    pub fn apply_event(&mut self, event: &StoreEvent) {
        match event {
            StoreEvent::ModuleAdded { module } => {
                self.modules
                    .entry(module.module_uid.as_str().to_string())
                    .or_insert_with(|| module.clone());
            }
            StoreEvent::ModuleCountersUpdated {
                module_uid,
                queued_or_active,
                updated_at,
            } => {
                if let Some(m) = self.modules.get_mut(module_uid.as_str()) {
                    m.queued_or_active = *queued_or_active;
                    m.updated_at = *updated_at;
                }
            }
            StoreEvent::JobAdded { entry } => {
                self.jobs
                    .entry(entry.uid.as_str().to_string())
                    .or_insert_with(|| entry.clone());
            }
            StoreEvent::JobUpdated {
                uid,
                fields,
                updated_at,
            } => {
                if let Some(entry) = self.jobs.get_mut(uid.as_str()) {
                    for field in fields {
                        apply_field(entry, field);
                    }
                    entry.updated_at = *updated_at;
                }
            }
            StoreEvent::JobDeleted { uid } => {
                self.jobs.remove(uid.as_str());
                self.queue_refs.remove(uid.as_str());
            }
            StoreEvent::Enqueued {
                uid,
                priority,
                added_at,
            } => {
                self.queue_refs.insert(
                    uid.as_str().to_string(),
                    QueueRef {
                        priority: *priority,
                        added_at: *added_at,
                    },
                );
            }
            StoreEvent::Dequeued { uid } => {
                self.queue_refs.remove(uid.as_str());
            }
        }
    }

    /// Startup reconstruction: any entry left `Processing` when the process
    /// died is reset to `Queued` at priority 0 and re-enqueued. Queue
    /// references whose entry is missing are dropped (logged by the
    /// caller, never fatal).
    pub fn reconstruct_on_startup(&mut self, now: i64) -> Vec<EntryId> {
        let mut reset = Vec::new();
        for entry in self.jobs.values_mut() {
            if entry.status == EntryStatus::Processing {
                entry.requeue_at_priority_zero(now);
                reset.push(entry.uid.clone());
            }
        }
        for uid in &reset {
            self.queue_refs.insert(
                uid.as_str().to_string(),
                QueueRef {
                    priority: 0,
                    added_at: now,
                },
            );
        }

        let dangling: Vec<String> = self
            .queue_refs
            .keys()
            .filter(|uid| !self.jobs.contains_key(uid.as_str()))
            .cloned()
            .collect();
        for uid in dangling {
            self.queue_refs.remove(&uid);
        }

        reset
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
