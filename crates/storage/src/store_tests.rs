// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use oj_core::{EntryConfig, EntryStatus, Module};
use std::time::Duration;
use tempfile::tempdir;

fn open(dir: &std::path::Path) -> (Store, Vec<EntryId>) {
    Store::open(dir, 1_000).unwrap()
}

fn file_module(uid: &str) -> Module {
    Module::new_file(ModuleId::new(uid), 1_000)
}

#[test]
fn submit_entry_admits_and_queues() {
    let dir = tempdir().unwrap();
    let (store, _) = open(dir.path());
    store.add_module(file_module("DefaultFileModule")).unwrap();

    let entry = Entry::new(EntryConfig {
        uid: EntryId::new("e1"),
        module_uid: ModuleId::new("DefaultFileModule"),
        priority: 5,
        initial_prompt: None,
        source_url: None,
        created_at: 1_000,
    });
    assert!(store.submit_entry(entry).unwrap());
    assert!(store.exists_job("e1"));
    assert_eq!(store.stats().queue_length, 1);
    let module = store.get_module("DefaultFileModule").unwrap();
    assert_eq!(module.queued_or_active, 1);
}

#[test]
fn submit_entry_rejects_over_capacity() {
    let dir = tempdir().unwrap();
    let (store, _) = open(dir.path());
    store
        .add_module(Module::new_opencast(ModuleId::new("oc"), 1, 1_000))
        .unwrap();

    let mk = |uid: &str| Entry::new(EntryConfig {
        uid: EntryId::new(uid),
        module_uid: ModuleId::new("oc"),
        priority: 0,
        initial_prompt: None,
        source_url: None,
        created_at: 1_000,
    });

    assert!(store.submit_entry(mk("a")).unwrap());
    assert!(!store.submit_entry(mk("b")).unwrap());
    assert!(store.exists_job("a"));
    assert!(!store.exists_job("b"));
}

#[test]
fn submit_entry_unknown_module_errors() {
    let dir = tempdir().unwrap();
    let (store, _) = open(dir.path());
    let entry = Entry::new(EntryConfig {
        uid: EntryId::new("e1"),
        module_uid: ModuleId::new("nope"),
        priority: 0,
        initial_prompt: None,
        source_url: None,
        created_at: 1_000,
    });
    assert!(matches!(
        store.submit_entry(entry),
        Err(StoreError::Core(CoreError::NotFound(_)))
    ));
}

#[test]
fn dequeue_respects_priority_then_fifo() {
    let dir = tempdir().unwrap();
    let (store, _) = open(dir.path());
    store.add_module(file_module("DefaultFileModule")).unwrap();

    for (uid, priority, added_at) in [("low-first", 5, 1_000), ("high", 1, 1_001), ("low-second", 5, 1_002)] {
        let entry = Entry::new(EntryConfig {
            uid: EntryId::new(uid),
            module_uid: ModuleId::new("DefaultFileModule"),
            priority,
            initial_prompt: None,
            source_url: None,
            created_at: added_at,
        });
        assert!(store.submit_entry(entry).unwrap());
    }

    let first = store.dequeue(Duration::from_millis(50)).unwrap();
    assert_eq!(first.uid.as_str(), "high");
    let second = store.dequeue(Duration::from_millis(50)).unwrap();
    assert_eq!(second.uid.as_str(), "low-first");
    let third = store.dequeue(Duration::from_millis(50)).unwrap();
    assert_eq!(third.uid.as_str(), "low-second");
    assert!(store.dequeue(Duration::from_millis(20)).is_none());
}

#[test]
fn dequeue_times_out_on_empty_queue() {
    let dir = tempdir().unwrap();
    let (store, _) = open(dir.path());
    let start = std::time::Instant::now();
    assert!(store.dequeue(Duration::from_millis(30)).is_none());
    assert!(start.elapsed() >= Duration::from_millis(25));
}

#[test]
fn update_job_unknown_uid_errors() {
    let dir = tempdir().unwrap();
    let (store, _) = open(dir.path());
    let err = store.update_job(&EntryId::new("missing"), vec![EntryField::Priority(1)], 1_000);
    assert!(matches!(err, Err(StoreError::Core(CoreError::NotFound(_)))));
}

#[test]
fn delete_job_removes_from_jobs_and_queue() {
    let dir = tempdir().unwrap();
    let (store, _) = open(dir.path());
    store.add_module(file_module("DefaultFileModule")).unwrap();
    let entry = Entry::new(EntryConfig {
        uid: EntryId::new("e1"),
        module_uid: ModuleId::new("DefaultFileModule"),
        priority: 0,
        initial_prompt: None,
        source_url: None,
        created_at: 1_000,
    });
    store.submit_entry(entry).unwrap();
    store.delete_job(&EntryId::new("e1")).unwrap();
    assert!(!store.exists_job("e1"));
    assert_eq!(store.stats().queue_length, 0);
}

#[test]
fn reopen_after_checkpoint_restores_state() {
    let dir = tempdir().unwrap();
    {
        let (store, _) = open(dir.path());
        store.add_module(file_module("DefaultFileModule")).unwrap();
        let entry = Entry::new(EntryConfig {
            uid: EntryId::new("e1"),
            module_uid: ModuleId::new("DefaultFileModule"),
            priority: 0,
            initial_prompt: None,
            source_url: None,
            created_at: 1_000,
        });
        store.submit_entry(entry).unwrap();
        store.checkpoint_sync().unwrap();
    }
    let (store, reset) = open(dir.path());
    assert!(reset.is_empty());
    assert!(store.exists_job("e1"));
    assert_eq!(store.stats().queue_length, 1);
}

#[test]
fn reopen_requeues_processing_entries_at_priority_zero() {
    let dir = tempdir().unwrap();
    {
        let (store, _) = open(dir.path());
        store.add_module(file_module("DefaultFileModule")).unwrap();
        let entry = Entry::new(EntryConfig {
            uid: EntryId::new("e1"),
            module_uid: ModuleId::new("DefaultFileModule"),
            priority: 9,
            initial_prompt: None,
            source_url: None,
            created_at: 1_000,
        });
        store.submit_entry(entry).unwrap();
        store.dequeue(Duration::from_millis(10)).unwrap();
        store
            .update_job(&EntryId::new("e1"), vec![EntryField::Status(EntryStatus::Processing)], 1_001)
            .unwrap();
        // No checkpoint: crash recovery must replay this from the WAL alone.
    }
    let (store, reset) = open(dir.path());
    assert_eq!(reset, vec![EntryId::new("e1")]);
    let entry = store.load_job("e1").unwrap();
    assert_eq!(entry.status, EntryStatus::Queued);
    assert_eq!(entry.priority, 0);
    assert_eq!(store.stats().queue_length, 1);
}

#[test]
fn sync_flushes_without_error_on_idle_store() {
    let dir = tempdir().unwrap();
    let (store, _) = open(dir.path());
    store.sync().unwrap();
}
