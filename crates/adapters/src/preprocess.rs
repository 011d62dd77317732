// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-module preprocessing step, run by the worker before transcription
//! starts. Modelled as one trait with a variant per [`ModuleKind`], mirroring
//! `core::module`'s tagged-enum approach rather than trait objects wired
//! through a registry.

use oj_core::{CoreError, Entry};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("upstream returned status {0}")]
    BadStatus(u16),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PreprocessError> for CoreError {
    fn from(e: PreprocessError) -> Self {
        CoreError::PreprocessingFailed(e.to_string())
    }
}

/// Stage `entry`'s audio at `Entry::staging_path(data_dir, &entry.uid)` so
/// the transcriber can read it from a known location regardless of module.
pub trait Preprocessor: Send + Sync {
    fn preprocess(&self, entry: &Entry, data_dir: &Path) -> Result<(), PreprocessError>;
}

/// `File` entries are already staged by the HTTP multipart handler; nothing
/// to do here.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilePreprocessor;

impl Preprocessor for FilePreprocessor {
    fn preprocess(&self, _entry: &Entry, _data_dir: &Path) -> Result<(), PreprocessError> {
        Ok(())
    }
}

/// `Opencast` entries carry a `source_url`; fetch it with a blocking GET and
/// write the body to the staging path. Blocking because this runs inside a
/// `spawn_blocking` task on the worker side, same as the transcriber's child
/// process wait.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpencastPreprocessor;

impl Preprocessor for OpencastPreprocessor {
    fn preprocess(&self, entry: &Entry, data_dir: &Path) -> Result<(), PreprocessError> {
        let url = entry
            .source_url
            .as_deref()
            .ok_or_else(|| PreprocessError::Fetch("entry has no source_url".into()))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(crate::subprocess::OPENCAST_FETCH_TIMEOUT)
            .build()
            .map_err(|e| PreprocessError::Fetch(e.to_string()))?;
        let response = client
            .get(url)
            .send()
            .map_err(|e| PreprocessError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PreprocessError::BadStatus(response.status().as_u16()));
        }
        let bytes = response
            .bytes()
            .map_err(|e| PreprocessError::Fetch(e.to_string()))?;

        let dest = Entry::staging_path(data_dir, &entry.uid);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&dest, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "preprocess_tests.rs"]
mod tests;
