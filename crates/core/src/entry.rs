// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entry: one submitted transcription request, and the state machine it
//! moves through from submission to a terminal outcome.

use crate::module::ModuleId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a transcription job entry (UUIDv4 string).
    #[derive(Default)]
    pub struct EntryId;
}

/// Internal state machine. Ascending order unless a shutdown requeue sends
/// `Processing` back to `Queued` at priority 0.
///
/// ```text
///         submit           scheduler            worker
/// Queued ─────────► Prepared ─────► Processing ──┬─► Completed
///   ▲                                            ├─► Failed
///   │                                            └─► Canceled
///   └── requeue on shutdown (priority forced to 0)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Queued,
    Prepared,
    Processing,
    Completed,
    Failed,
    Canceled,
}

impl EntryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EntryStatus::Completed | EntryStatus::Failed | EntryStatus::Canceled
        )
    }

    /// The externally-visible status name used on the GET `/status` wire
    /// contract. `Processing` is surfaced as `Processed` and `Completed` as
    /// `Whispered`; every other name passes through unchanged. This is a
    /// pure rename at the HTTP boundary — the internal machine never uses
    /// these names.
    pub fn external_name(&self) -> &'static str {
        match self {
            EntryStatus::Queued => "Queued",
            EntryStatus::Prepared => "Prepared",
            EntryStatus::Processing => "Processed",
            EntryStatus::Completed => "Whispered",
            EntryStatus::Failed => "Failed",
            EntryStatus::Canceled => "Canceled",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Queued => write!(f, "queued"),
            EntryStatus::Prepared => write!(f, "prepared"),
            EntryStatus::Processing => write!(f, "processing"),
            EntryStatus::Completed => write!(f, "completed"),
            EntryStatus::Failed => write!(f, "failed"),
            EntryStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// Fields needed to create a brand-new entry at submission time.
#[derive(Debug, Clone)]
pub struct EntryConfig {
    pub uid: EntryId,
    pub module_uid: ModuleId,
    pub priority: i32,
    pub initial_prompt: Option<String>,
    /// Media URL to fetch during preprocessing. Only set for `Opencast`
    /// module entries; `File` entries arrive pre-staged by the submission
    /// handler and leave this `None`.
    pub source_url: Option<String>,
    pub created_at: i64,
}

/// One submitted transcription request and everything learned about it
/// since submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub uid: EntryId,
    pub module_uid: ModuleId,
    pub priority: i32,
    pub created_at: i64,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whisper_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whisper_language: Option<String>,
    /// Opaque result tree from the engine. Tolerant of 32/64-bit floats and
    /// nested arrays, so this is a `serde_json::Value`, not a typed struct.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whisper_result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    pub updated_at: i64,
}

impl Entry {
    pub fn new(config: EntryConfig) -> Self {
        Self {
            uid: config.uid,
            module_uid: config.module_uid,
            priority: config.priority,
            created_at: config.created_at,
            status: EntryStatus::Queued,
            initial_prompt: config.initial_prompt,
            source_url: config.source_url,
            whisper_model: None,
            whisper_language: None,
            whisper_result: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            updated_at: config.created_at,
        }
    }

    /// Path the worker must stage audio at before transcription, and must
    /// remove again by the time the entry reaches a terminal status.
    pub fn staging_path(data_dir: &std::path::Path, uid: &EntryId) -> std::path::PathBuf {
        data_dir.join("audioInput").join(uid.as_str())
    }

    /// Reset this entry for a requeue: either a shutdown-initiated requeue
    /// (priority forced to 0, status back to `Queued`) or the equivalent
    /// startup reconstruction for an entry found `Processing` after a crash.
    pub fn requeue_at_priority_zero(&mut self, now: i64) {
        self.status = EntryStatus::Queued;
        self.priority = 0;
        self.updated_at = now;
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
