// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable events appended to the write-ahead log and applied to
//! [`crate::entry::Entry`] / [`crate::module::Module`] state.
//!
//! Every event must be safe to apply twice: the executor applies it once
//! live when the mutating call returns, and the WAL reader may apply it
//! again during replay after a crash that happened before the prior
//! checkpoint advanced past this event's sequence number.

use crate::entry::{Entry, EntryId, EntryStatus};
use crate::module::{Module, ModuleId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A field update applied atomically to an [`Entry`] via `update_job`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryField {
    Status(EntryStatus),
    WhisperModel(Option<String>),
    WhisperLanguage(Option<String>),
    WhisperResult(Option<serde_json::Value>),
    ErrorMessage(Option<String>),
    StartedAt(Option<i64>),
    CompletedAt(Option<i64>),
    Priority(i32),
}

/// One durable mutation of the materialized state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StoreEvent {
    ModuleAdded { module: Module },
    ModuleCountersUpdated { module_uid: ModuleId, queued_or_active: u32, updated_at: i64 },
    JobAdded { entry: Entry },
    JobUpdated { uid: EntryId, fields: Vec<EntryField>, updated_at: i64 },
    JobDeleted { uid: EntryId },
    Enqueued { uid: EntryId, priority: i32, added_at: i64 },
    Dequeued { uid: EntryId },
}

impl StoreEvent {
    pub fn job_uid(&self) -> Option<&EntryId> {
        match self {
            StoreEvent::JobAdded { entry } => Some(&entry.uid),
            StoreEvent::JobUpdated { uid, .. } => Some(uid),
            StoreEvent::JobDeleted { uid } => Some(uid),
            StoreEvent::Enqueued { uid, .. } => Some(uid),
            StoreEvent::Dequeued { uid } => Some(uid),
            StoreEvent::ModuleAdded { .. } | StoreEvent::ModuleCountersUpdated { .. } => None,
        }
    }
}

/// Apply a single field update to an entry. Idempotent: setting the same
/// field to the same value twice is a no-op the second time.
pub fn apply_field(entry: &mut Entry, field: &EntryField) {
    match field {
        EntryField::Status(s) => entry.status = *s,
        EntryField::WhisperModel(v) => entry.whisper_model = v.clone(),
        EntryField::WhisperLanguage(v) => entry.whisper_language = v.clone(),
        EntryField::WhisperResult(v) => entry.whisper_result = v.clone(),
        EntryField::ErrorMessage(v) => entry.error_message = v.clone(),
        EntryField::StartedAt(v) => entry.started_at = *v,
        EntryField::CompletedAt(v) => entry.completed_at = *v,
        EntryField::Priority(p) => entry.priority = *p,
    }
}

/// Field name used in `update_job`'s `*InvalidField*` error when the caller
/// supplies something outside this set.
pub const VALID_ENTRY_FIELD_NAMES: &[&str] = &[
    "status",
    "whisper_model",
    "whisper_language",
    "whisper_result",
    "error_message",
    "started_at",
    "completed_at",
    "priority",
];

/// Map of `uid -> set of fields` supplied to `update_job`, used only to
/// validate callers before a [`StoreEvent::JobUpdated`] is constructed.
pub type FieldMap = HashMap<String, serde_json::Value>;

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
