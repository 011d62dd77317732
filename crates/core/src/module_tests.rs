// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn file_module_has_no_cap_and_always_admits() {
    let m = Module::new_file(ModuleId::new("f1"), 0);
    assert_eq!(m.max_queue_length, None);
    assert!(m.admits_one_more());
}

#[test]
fn opencast_module_rejects_once_at_cap() {
    let mut m = Module::new_opencast(ModuleId::new("o1"), 1, 0);
    assert!(m.admits_one_more());
    m.queued_or_active = 1;
    assert!(!m.admits_one_more());
}

#[test]
fn opencast_module_kind_tag_round_trips() {
    let m = Module::new_opencast(ModuleId::new("o2"), 3, 0);
    let json = serde_json::to_string(&m).unwrap();
    let back: Module = serde_json::from_str(&json).unwrap();
    assert_eq!(back.kind, ModuleKind::Opencast);
    assert_eq!(back.max_queue_length, Some(3));
}
