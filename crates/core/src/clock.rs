// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time abstraction so tests can control `created_at`/`started_at` ordering
//! without sleeping real wall-clock time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of truth for "now", injected everywhere a timestamp is recorded.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn epoch_secs(&self) -> i64;

    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64 {
        (self.epoch_secs().max(0) as u64) * 1000
    }
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Deterministic clock for tests. Starts at a fixed instant and only moves
/// forward when explicitly advanced, so `created_at` ordering in priority
/// tests is reproducible.
#[derive(Debug, Clone)]
pub struct FakeClock {
    secs: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new(start_epoch_secs: i64) -> Self {
        Self {
            secs: Arc::new(AtomicU64::new(start_epoch_secs.max(0) as u64)),
        }
    }

    /// Advance the clock by `secs` seconds and return the new value.
    pub fn advance(&self, secs: i64) -> i64 {
        self.secs.fetch_add(secs.max(0) as u64, Ordering::SeqCst) as i64 + secs
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(1_700_000_000)
    }
}

impl Clock for FakeClock {
    fn epoch_secs(&self) -> i64 {
        self.secs.load(Ordering::SeqCst) as i64
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
