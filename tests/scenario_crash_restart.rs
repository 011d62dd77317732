// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash and restart: a job mid-Processing when the daemon is killed -9 is
//! reset to Queued on the next `Store::open`, and a fresh daemon pointed at
//! the same state directory carries it through to completion.

use crate::support::fake_whisper;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

const ADMIN_USER: &str = "admin";
const ADMIN_PASS: &str = "admin-secret";

fn spawn_ojd(data_dir: &Path, whisper: &Path, addr: &str) -> Child {
    Command::new(assert_cmd::cargo::cargo_bin("ojd"))
        .env("OJ_STATE_DIR", data_dir)
        .env("OJ_WHISPER_BINARY", whisper)
        .env("OJ_HTTP_ADDR", addr)
        .env("login_username", ADMIN_USER)
        .env("login_password", ADMIN_PASS)
        .env("whisper_model", "tiny")
        .env("whisper_cpu_threads", "1")
        .env("parallel_workers", "1")
        .env("log", "warn")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn ojd")
}

async fn wait_for_liveness(client: &reqwest::Client, base: &str, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if let Ok(resp) = client.get(format!("{base}/")).timeout(Duration::from_millis(500)).send().await {
            if resp.status() == reqwest::StatusCode::OK {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn poll_until(
    client: &reqwest::Client, base: &str, job_id: &str, timeout: Duration,
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
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    last
}

#[tokio::test]
async fn job_processing_at_crash_time_survives_restart_to_whispered() {
    let dir = tempfile::tempdir().expect("tempdir");
    // Long enough to observe "Processed" before the stub would finish, so the
    // kill -9 lands while the entry is genuinely Processing.
    let whisper = fake_whisper(dir.path(), 5);
    let addr = "127.0.0.1:18421";
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let mut child = spawn_ojd(dir.path(), &whisper, addr);
    assert!(wait_for_liveness(&client, &base, Duration::from_secs(10)).await, "daemon did not become ready");

    let form = reqwest::multipart::Form::new()
        .text("priority", "1")
        .part("file", reqwest::multipart::Part::bytes(b"fake-audio".to_vec()).file_name("clip.wav"));
    let submit = client
        .post(format!("{base}/transcribe"))
        .basic_auth(ADMIN_USER, Some(ADMIN_PASS))
        .multipart(form)
        .send()
        .await
        .expect("submit request");
    assert_eq!(submit.status(), reqwest::StatusCode::CREATED);
    let job_id = submit.json::<serde_json::Value>().await.expect("submit body")["jobId"]
        .as_str()
        .expect("jobId present")
        .to_string();

    let seen = poll_until(&client, &base, &job_id, Duration::from_secs(10), |s| s == "Processed").await;
    assert_eq!(seen.as_deref(), Some("Processed"));

    let pid = child.id();
    let status = Command::new("kill").arg("-9").arg(pid.to_string()).status().expect("send kill -9");
    assert!(status.success());
    let _ = child.wait();

    // Give the OS a moment to release the lock file's flock.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut restarted = spawn_ojd(dir.path(), &whisper, addr);
    assert!(wait_for_liveness(&client, &base, Duration::from_secs(10)).await, "restarted daemon did not become ready");

    let seen = poll_until(&client, &base, &job_id, Duration::from_secs(15), |s| s == "Whispered").await;
    assert_eq!(seen.as_deref(), Some("Whispered"));

    let _ = restarted.kill();
    let _ = restarted.wait();
}
