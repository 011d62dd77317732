// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File happy path: submit a file job, watch it move
//! Queued -> Prepared -> Processed -> Whispered, then fetch its VTT caption.

use crate::support::{self, fake_whisper, poll_status, spawn_daemon, submit_file_job};
use std::time::Duration;

#[tokio::test]
async fn file_job_reaches_whispered_and_yields_vtt_captions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let whisper = fake_whisper(dir.path(), 0);
    let daemon = spawn_daemon(dir.path(), &whisper, 1).await;
    let client = reqwest::Client::new();

    let job_id = submit_file_job(&client, &daemon.base_url, 5).await;

    let seen = poll_status(&client, &daemon.base_url, &job_id, Duration::from_secs(10), |s| s == "Whispered").await;
    assert_eq!(seen.as_deref(), Some("Whispered"));

    let caption = client
        .get(format!("{}/transcribe?id={job_id}&format=vtt", daemon.base_url))
        .basic_auth(support::ADMIN_USER, Some(support::ADMIN_PASS))
        .send()
        .await
        .expect("caption request");
    assert_eq!(caption.status(), reqwest::StatusCode::OK);
    let body = caption.text().await.expect("caption body");
    assert!(body.starts_with("WEBVTT"));
    assert!(body.contains("hello world from the test fixture"));

    daemon.shutdown().await;
}
