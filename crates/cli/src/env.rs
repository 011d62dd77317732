// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the CLI crate.

/// Explicit override for the `ojd` binary path, bypassing the sibling/dev-build search.
pub fn daemon_binary() -> Option<String> {
    std::env::var("OJ_DAEMON_BINARY").ok()
}

pub fn cargo_manifest_dir() -> Option<String> {
    std::env::var("CARGO_MANIFEST_DIR").ok()
}
