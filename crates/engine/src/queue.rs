// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin blocking wrapper over `Store`'s queue operations. The queue itself
//! lives in the Store (dispatch order, durability, the wait condition); this
//! type only gives the scheduler a narrower surface than the full facade.

use oj_core::{Entry, EntryId};
use oj_storage::Store;
use std::sync::Arc;
use std::time::Duration;

pub struct Queue {
    store: Arc<Store>,
}

impl Queue {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Block up to `timeout` for the next entry in dispatch order. Used by
    /// the scheduler thread, which is not async and blocks here on purpose —
    /// this is the one place in the engine that is allowed to.
    pub fn pop(&self, timeout: Duration) -> Option<Entry> {
        self.store.dequeue(timeout)
    }

    /// Used by a worker that must give a job back to the queue: a shutdown
    /// requeue, or a crash-recovery path invoked outside `Store::open`.
    pub fn push_back(&self, uid: &EntryId, priority: i32, now: i64) -> Result<(), oj_storage::StoreError> {
        self.store.enqueue(uid, priority, now)
    }

    pub fn len(&self) -> u64 {
        self.store.stats().queue_length
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
