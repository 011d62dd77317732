// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use oj_core::{EntryConfig, EntryId, FakeClock, Module, ModuleId};
use std::time::Instant;
use tempfile::tempdir;

fn worker_config(dir: &std::path::Path) -> Arc<WorkerConfig> {
    Arc::new(WorkerConfig {
        data_dir: dir.to_path_buf(),
        transcriber: crate::transcriber::TranscriberConfig {
            whisper_binary: dir.join("does-not-exist"),
            models_dir: dir.join("models"),
            whisper_model: "tiny".to_string(),
            whisper_cpu_threads: 1,
        },
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dispatches_queued_job_and_tracks_active_count() {
    let dir = tempdir().unwrap();
    let (store, _reset) = Store::open(dir.path(), 0).unwrap();
    let store = Arc::new(store);
    store
        .add_module(Module::new_file(ModuleId::new("DefaultFileModule"), 0))
        .unwrap();

    let uid = EntryId::new("e1");
    store
        .submit_entry(oj_core::Entry::new(EntryConfig {
            uid: uid.clone(),
            module_uid: ModuleId::new("DefaultFileModule"),
            priority: 0,
            initial_prompt: None,
            source_url: None,
            created_at: 0,
        }))
        .unwrap();

    let registry = Arc::new(CancelRegistry::new());
    let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(0));
    let scheduler = Scheduler::spawn(
        store.clone(),
        registry.clone(),
        clock,
        worker_config(dir.path()),
        1,
        tokio::runtime::Handle::current(),
    );

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let job = store.load_job(uid.as_str());
        if job.as_ref().map(|j| j.status.is_terminal()).unwrap_or(false) {
            break;
        }
        assert!(Instant::now() < deadline, "job never reached a terminal status");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let job = store.load_job(uid.as_str()).unwrap();
    assert_eq!(job.status, EntryStatus::Failed);

    let deadline = Instant::now() + Duration::from_secs(2);
    while scheduler.running_jobs() != 0 {
        assert!(Instant::now() < deadline, "active count never settled back to zero");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    scheduler.shutdown();
}
