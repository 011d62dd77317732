// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer: write-ahead log, materialized state, and crash-safe
//! snapshot/checkpoint persistence.

mod checkpoint;
mod migration;
mod snapshot;
mod state;
mod store;
mod wal;

/// Current on-disk snapshot schema version. Bump when [`state::MaterializedState`]'s
/// shape changes in a way that needs a [`migration::Migration`].
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

pub use checkpoint::{
    load_snapshot, CheckpointError, CheckpointHandle, CheckpointResult, CheckpointWriter,
    Checkpointer, FsCheckpointWriter,
};
pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use snapshot::{Snapshot, SnapshotError};
pub use state::{MaterializedState, QueueRef, StatusCounts};
pub use store::{Store, StoreError};
pub use wal::{Wal, WalEntry, WalError};
