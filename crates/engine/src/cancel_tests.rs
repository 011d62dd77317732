// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn register_then_cancel_marks_token_canceled() {
    let registry = CancelRegistry::new();
    let uid = EntryId::new("e1");
    let token = registry.register(uid.clone());
    assert!(!token.is_canceled());
    assert!(registry.cancel(&uid, false));
    assert!(token.is_canceled());
    assert!(!token.should_requeue());
}

#[test]
fn cancel_unknown_uid_returns_false() {
    let registry = CancelRegistry::new();
    assert!(!registry.cancel(&EntryId::new("missing"), false));
}

#[test]
fn unregister_drops_the_token() {
    let registry = CancelRegistry::new();
    let uid = EntryId::new("e1");
    registry.register(uid.clone());
    registry.unregister(&uid);
    assert!(!registry.cancel(&uid, false));
    assert!(registry.is_empty());
}

#[test]
fn cancel_all_for_shutdown_sets_requeue_on_every_token() {
    let registry = CancelRegistry::new();
    let a = registry.register(EntryId::new("a"));
    let b = registry.register(EntryId::new("b"));
    let uids = registry.cancel_all_for_shutdown();
    assert_eq!(uids.len(), 2);
    assert!(a.is_canceled() && a.should_requeue());
    assert!(b.is_canceled() && b.should_requeue());
}
