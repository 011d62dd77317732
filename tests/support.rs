// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the end-to-end scenario tests in §8 of the design
//! notes: an in-process daemon (real `Store`, real `Scheduler`, real axum
//! router) talking to a stand-in `whisper-cli` so the tests never depend on
//! an actual model download or audio codec.

use oj_daemon::{Config, Daemon};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpListener;

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASS: &str = "admin-secret";

/// Write an executable stand-in for `whisper-cli`: the `--detect-language`
/// probe answers `en`, the full pass sleeps `delay_secs` (to give tests a
/// window to observe `Processing`) and then prints one transcript segment.
pub fn fake_whisper(dir: &Path, delay_secs: u64) -> PathBuf {
    let path = dir.join("fake-whisper.sh");
    let script = format!(
        "#!/bin/sh\nset -e\ndetect=false\nfor arg in \"$@\"; do\n  case \"$arg\" in\n    --detect-language) detect=true ;;\n  esac\ndone\nif [ \"$detect\" = \"true\" ]; then\n  echo en\n  exit 0\nfi\nsleep {delay_secs}\ncat <<'JSON'\n{{\"segments\":[{{\"start\":0.0,\"end\":1.2,\"text\":\"hello world from the test fixture\"}}]}}\nJSON\n",
    );
    std::fs::write(&path, script).expect("write fake whisper script");
    let mut perms = std::fs::metadata(&path).expect("stat fake whisper script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod fake whisper script");
    path
}

pub struct TestDaemon {
    pub base_url: String,
    daemon: Option<Daemon>,
}

impl TestDaemon {
    pub async fn shutdown(mut self) {
        if let Some(daemon) = self.daemon.take() {
            daemon.shutdown();
        }
    }
}

/// Build a `Config` pointing at `data_dir`, start a real `Daemon` (lock,
/// `Store`, scheduler) and serve the HTTP surface on an ephemeral port.
pub async fn spawn_daemon(data_dir: &Path, whisper_binary: &Path, parallel_workers: usize) -> TestDaemon {
    let config = Config {
        data_dir: data_dir.to_path_buf(),
        lock_path: data_dir.join("daemon.pid"),
        version_path: data_dir.join("daemon.version"),
        log_path: data_dir.join("daemon.log"),
        models_dir: data_dir.join("models"),
        whisper_binary: whisper_binary.to_path_buf(),
        bind_addr: "127.0.0.1:0".parse().expect("static addr parses"),
        login_username: ADMIN_USER.to_string(),
        login_password: ADMIN_PASS.to_string(),
        whisper_model: "tiny".to_string(),
        whisper_cpu_threads: 1,
        parallel_workers,
        shutdown_grace: Duration::from_secs(5),
        log_filter: "warn".to_string(),
    };

    let daemon = Daemon::startup(config.clone(), tokio::runtime::Handle::current()).expect("daemon startup");

    let state = oj_daemon::http::AppState {
        store: daemon.store.clone(),
        cancel_registry: daemon.cancel_registry.clone(),
        clock: daemon.clock.clone(),
        self_care: std::sync::Arc::new(oj_adapters::SelfCareGate::new(config.data_dir.clone())),
        id_gen: oj_daemon::http::IdSource::Uuid(oj_core::UuidIdGen),
        data_dir: config.data_dir.clone(),
        login_username: config.login_username.clone(),
        login_password: config.login_password.clone(),
        parallel_workers: config.parallel_workers,
        running_jobs: daemon.running_jobs.clone(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let app = oj_daemon::router(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestDaemon {
        base_url: format!("http://{addr}"),
        daemon: Some(daemon),
    }
}

/// Poll `GET /status?id=` until `predicate` matches the reported status or
/// `timeout` elapses, returning the last seen status (or `None` if the job
/// was never found).
pub async fn poll_status(
    client: &reqwest::Client,
    base: &str,
    job_id: &str,
    timeout: Duration,
    mut predicate: impl FnMut(&str) -> bool,
) -> Option<String> {
    let deadline = std::time::Instant::now() + timeout;
    let mut last = None;
    while std::time::Instant::now() < deadline {
        let resp = client
            .get(format!("{base}/status?id={job_id}"))
            .basic_auth(ADMIN_USER, Some(ADMIN_PASS))
            .send()
            .await
            .expect("status request");
        if resp.status() == reqwest::StatusCode::OK {
            let body: serde_json::Value = resp.json().await.expect("status body");
            let status = body["status"].as_str().unwrap_or_default().to_string();
            if predicate(&status) {
                return Some(status);
            }
            last = Some(status);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    last
}

pub async fn submit_file_job(client: &reqwest::Client, base: &str, priority: i32) -> String {
    let form = reqwest::multipart::Form::new()
        .text("priority", priority.to_string())
        .part("file", reqwest::multipart::Part::bytes(b"RIFF....WAVEfmt ".to_vec()).file_name("clip.wav"));
    let resp = client
        .post(format!("{base}/transcribe"))
        .basic_auth(ADMIN_USER, Some(ADMIN_PASS))
        .multipart(form)
        .send()
        .await
        .expect("submit request");
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED, "job submission should be accepted");
    let body: serde_json::Value = resp.json().await.expect("submit body");
    body["jobId"].as_str().expect("jobId present").to_string()
}
