// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::entry::{EntryConfig, EntryId};
use crate::module::ModuleId;

fn make_entry() -> Entry {
    Entry::new(EntryConfig {
        uid: EntryId::new("e1"),
        module_uid: ModuleId::new("DefaultFileModule"),
        priority: 5,
        initial_prompt: None,
        source_url: None,
        created_at: 0,
    })
}

#[test]
fn apply_field_is_idempotent() {
    let mut entry = make_entry();
    let field = EntryField::Status(EntryStatus::Processing);
    apply_field(&mut entry, &field);
    apply_field(&mut entry, &field);
    assert_eq!(entry.status, EntryStatus::Processing);
}

#[test]
fn apply_field_whisper_result_replaces_value() {
    let mut entry = make_entry();
    apply_field(
        &mut entry,
        &EntryField::WhisperResult(Some(serde_json::json!({"segments": []}))),
    );
    assert!(entry.whisper_result.is_some());
}

#[test]
fn job_uid_extracts_from_each_variant() {
    let uid = EntryId::new("e1");
    let event = StoreEvent::Dequeued { uid: uid.clone() };
    assert_eq!(event.job_uid(), Some(&uid));
}

#[test]
fn store_event_round_trips_through_json() {
    let event = StoreEvent::Enqueued {
        uid: EntryId::new("e1"),
        priority: 0,
        added_at: 42,
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: StoreEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back.job_uid(), event.job_uid());
}
