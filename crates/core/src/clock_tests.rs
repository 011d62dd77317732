// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_starts_at_given_epoch() {
    let clock = FakeClock::new(1_000);
    assert_eq!(clock.epoch_secs(), 1_000);
}

#[test]
fn fake_clock_advance_moves_forward() {
    let clock = FakeClock::new(1_000);
    clock.advance(5);
    assert_eq!(clock.epoch_secs(), 1_005);
}

#[test]
fn fake_clock_shared_handles_see_same_advance() {
    let clock = FakeClock::new(0);
    let other = clock.clone();
    clock.advance(3);
    assert_eq!(other.epoch_secs(), 3);
}

#[test]
fn system_clock_epoch_secs_is_recent() {
    let clock = SystemClock;
    assert!(clock.epoch_secs() > 1_700_000_000);
}
