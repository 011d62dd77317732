// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation registry: one [`tokio_util::sync::CancellationToken`] per
//! in-flight job, registered by the scheduler at dispatch time and consulted
//! by the worker and transcriber at every yield point.
//!
//! A cancellation carries one of two outcomes: abort (job ends `Canceled`,
//! does not return to the queue) or requeue (used at shutdown — the job
//! goes back to `Queued` at priority zero so the next process picks it up).

use oj_core::EntryId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct CancelToken {
    token: CancellationToken,
    requeue: Arc<AtomicBool>,
}

impl CancelToken {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            requeue: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Only meaningful once `is_canceled()` is true. `true` means the
    /// cancellation came from a shutdown requeue, `false` means an explicit
    /// DELETE while the job was still queued or prepared.
    pub fn should_requeue(&self) -> bool {
        self.requeue.load(Ordering::SeqCst)
    }
}

/// Tracks one [`CancelToken`] per job uid currently dispatched to a worker.
pub struct CancelRegistry {
    tokens: Mutex<HashMap<EntryId, CancelToken>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Called by the scheduler right before dispatch.
    pub fn register(&self, uid: EntryId) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(uid, token.clone());
        token
    }

    /// Called by the worker once a job reaches a terminal status.
    pub fn unregister(&self, uid: &EntryId) {
        self.tokens.lock().remove(uid);
    }

    /// Request cancellation of an in-flight job. Returns `false` if the job
    /// isn't currently registered (already finished, or never dispatched).
    pub fn cancel(&self, uid: &EntryId, requeue: bool) -> bool {
        match self.tokens.lock().get(uid) {
            Some(entry) => {
                entry.requeue.store(requeue, Ordering::SeqCst);
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Shutdown path: request a requeueing cancellation for every job still
    /// registered, returning their uids so the caller can log them.
    pub fn cancel_all_for_shutdown(&self) -> Vec<EntryId> {
        let tokens = self.tokens.lock();
        let uids: Vec<EntryId> = tokens.keys().cloned().collect();
        for token in tokens.values() {
            token.requeue.store(true, Ordering::SeqCst);
            token.token.cancel();
        }
        uids
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}

impl Default for CancelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "cancel_tests.rs"]
mod tests;
