// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Module: a pluggable source of job entries, bundling admission policy and
//! a preprocessing step. Modelled as a tagged variant (`module_type`) rather
//! than an inheritance ladder — there is one interface per role, and the
//! concrete behavior is matched on the variant.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a module instance.
    pub struct ModuleId;
}

/// The well-known module that accepts pre-uploaded payloads directly.
pub const DEFAULT_FILE_MODULE_ID: &str = "DefaultFileModule";

/// Discriminator for the concrete module variant, persisted alongside the
/// module record so the variant can be reconstructed after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    File,
    Opencast,
}

impl ModuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::File => "file",
            ModuleKind::Opencast => "opencast",
        }
    }
}

/// A registered job source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub module_uid: ModuleId,
    pub kind: ModuleKind,
    /// Per-module admission cap. Only meaningful for `ModuleKind::Opencast`;
    /// `File` modules carry no cap (always `None`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_queue_length: Option<u32>,
    /// Count of entries for this module in `{Queued, Prepared, Processing}`.
    #[serde(default)]
    pub queued_or_active: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Module {
    pub fn new_file(module_uid: ModuleId, created_at: i64) -> Self {
        Self {
            module_uid,
            kind: ModuleKind::File,
            max_queue_length: None,
            queued_or_active: 0,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn new_opencast(module_uid: ModuleId, max_queue_length: u32, created_at: i64) -> Self {
        Self {
            module_uid,
            kind: ModuleKind::Opencast,
            max_queue_length: Some(max_queue_length),
            queued_or_active: 0,
            created_at,
            updated_at: created_at,
        }
    }

    /// Admission decision for a new entry against this module's cap.
    /// `File` modules never reject; `Opencast` modules reject once
    /// `queued_or_active >= max_queue_length`.
    pub fn admits_one_more(&self) -> bool {
        match self.max_queue_length {
            Some(cap) => self.queued_or_active < cap,
            None => true,
        }
    }
}

#[cfg(test)]
#[path = "module_tests.rs"]
mod tests;
