// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker: everything that happens to one dispatched job between `Prepared`
//! and a terminal status. Runs as a tokio task per job — the scheduler caps
//! how many of these exist at once by gating dispatch, not by limiting
//! tasks directly.

use crate::cancel::{CancelRegistry, CancelToken};
use crate::transcriber::{self, TranscribeError, TranscriberConfig};
use oj_adapters::{FilePreprocessor, OpencastPreprocessor, Preprocessor};
use oj_core::{Clock, Entry, EntryField, EntryStatus, ModuleKind};
use oj_storage::Store;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct WorkerConfig {
    pub data_dir: PathBuf,
    pub transcriber: TranscriberConfig,
}

fn preprocessor_for(kind: ModuleKind) -> Box<dyn Preprocessor> {
    match kind {
        ModuleKind::File => Box::new(FilePreprocessor),
        ModuleKind::Opencast => Box::new(OpencastPreprocessor),
    }
}

/// Run one job to completion. Takes ownership of `cancel` so the caller
/// (scheduler) only needs to hold onto the registry, not every token.
pub async fn run_job(
    entry: Entry,
    module_kind: ModuleKind,
    store: Arc<Store>,
    cancel_registry: Arc<CancelRegistry>,
    cancel: CancelToken,
    clock: Arc<dyn Clock>,
    config: Arc<WorkerConfig>,
) {
    let uid = entry.uid.clone();
    let module_uid = entry.module_uid.clone();

    let outcome = run_job_inner(&entry, module_kind, &store, &cancel, &clock, &config).await;

    let now = clock.epoch_secs();
    match outcome {
        Ok((language, result)) => {
            let _ = store.update_job(
                &uid,
                vec![
                    EntryField::WhisperLanguage(Some(language)),
                    EntryField::WhisperResult(Some(result)),
                    EntryField::Status(EntryStatus::Completed),
                    EntryField::CompletedAt(Some(now)),
                ],
                now,
            );
            remove_staging_file(&config.data_dir, &entry);
            info!(job = %uid, "job completed");
        }
        Err(JobOutcomeError::Canceled { requeue: true }) => {
            let _ = store.update_job(
                &uid,
                vec![EntryField::Status(EntryStatus::Queued), EntryField::Priority(0)],
                now,
            );
            if let Err(e) = store.enqueue(&uid, 0, now) {
                error!(job = %uid, error = %e, "failed to requeue canceled job");
            }
            info!(job = %uid, "job requeued at priority zero for shutdown");
        }
        Err(JobOutcomeError::Canceled { requeue: false }) => {
            let _ = store.update_job(
                &uid,
                vec![
                    EntryField::Status(EntryStatus::Canceled),
                    EntryField::CompletedAt(Some(now)),
                ],
                now,
            );
            remove_staging_file(&config.data_dir, &entry);
            info!(job = %uid, "job canceled");
        }
        Err(JobOutcomeError::Failed(message)) => {
            let _ = store.update_job(
                &uid,
                vec![
                    EntryField::Status(EntryStatus::Failed),
                    EntryField::ErrorMessage(Some(message.clone())),
                    EntryField::CompletedAt(Some(now)),
                ],
                now,
            );
            remove_staging_file(&config.data_dir, &entry);
            warn!(job = %uid, error = %message, "job failed");
        }
    }

    cancel_registry.unregister(&uid);
    let decrement_result = store.update_module_counters(&module_uid, -1, now);
    if let Err(e) = decrement_result {
        error!(module = %module_uid, error = %e, "failed to decrement module counters");
    }
}

enum JobOutcomeError {
    Canceled { requeue: bool },
    Failed(String),
}

async fn run_job_inner(
    entry: &Entry,
    module_kind: ModuleKind,
    store: &Arc<Store>,
    cancel: &CancelToken,
    clock: &Arc<dyn Clock>,
    config: &Arc<WorkerConfig>,
) -> Result<(String, serde_json::Value), JobOutcomeError> {
    let preprocessor = preprocessor_for(module_kind);
    preprocessor
        .preprocess(entry, &config.data_dir)
        .map_err(|e| JobOutcomeError::Failed(e.to_string()))?;

    if cancel.is_canceled() {
        return Err(JobOutcomeError::Canceled {
            requeue: cancel.should_requeue(),
        });
    }

    let now = clock.epoch_secs();
    store
        .update_job(
            &entry.uid,
            vec![
                EntryField::Status(EntryStatus::Processing),
                EntryField::StartedAt(Some(now)),
                EntryField::WhisperModel(Some(config.transcriber.whisper_model.clone())),
            ],
            now,
        )
        .map_err(|e| JobOutcomeError::Failed(e.to_string()))?;

    let entry = entry.clone();
    let transcriber_config = config.transcriber.clone();
    let data_dir = config.data_dir.clone();
    let cancel_for_blocking = cancel.clone();

    let result = tokio::task::spawn_blocking(move || {
        transcriber::transcribe(&entry, &data_dir, &transcriber_config, &cancel_for_blocking)
    })
    .await;

    match result {
        Ok(Ok(outcome)) => Ok((outcome.whisper_language, outcome.whisper_result)),
        Ok(Err(TranscribeError::Canceled)) => Err(JobOutcomeError::Canceled {
            requeue: cancel.should_requeue(),
        }),
        Ok(Err(TranscribeError::Failed(message))) => Err(JobOutcomeError::Failed(message)),
        Err(join_error) => Err(JobOutcomeError::Failed(format!(
            "transcriber task panicked: {join_error}"
        ))),
    }
}

fn remove_staging_file(data_dir: &std::path::Path, entry: &Entry) {
    let path = Entry::staging_path(data_dir, &entry.uid);
    if path.exists() {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(job = %entry.uid, error = %e, "failed to remove staging file");
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
