// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use oj_core::{EntryConfig, EntryId, ModuleId};
use tempfile::tempdir;

fn entry(source_url: Option<&str>) -> Entry {
    Entry::new(EntryConfig {
        uid: EntryId::new("e1"),
        module_uid: ModuleId::new("m"),
        priority: 0,
        initial_prompt: None,
        source_url: source_url.map(str::to_string),
        created_at: 0,
    })
}

#[test]
fn file_preprocessor_is_a_no_op() {
    let dir = tempdir().unwrap();
    FilePreprocessor.preprocess(&entry(None), dir.path()).unwrap();
    assert!(!Entry::staging_path(dir.path(), &EntryId::new("e1")).exists());
}

#[test]
fn opencast_preprocessor_requires_source_url() {
    let dir = tempdir().unwrap();
    let err = OpencastPreprocessor
        .preprocess(&entry(None), dir.path())
        .unwrap_err();
    assert!(matches!(err, PreprocessError::Fetch(_)));
}
