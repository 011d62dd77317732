// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synchronous transcription: load the model, detect language, run the
//! whisper binary as a child process, and poll it to completion or
//! cancellation. Runs inside a `spawn_blocking` task — nothing here is
//! async, and the child is a real OS process (never a thread) so it can be
//! terminated outright if canceled.

use crate::cancel::CancelToken;
use oj_core::Entry;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;
use thiserror::Error;

/// How often the parent polls the child for exit or a cancel request.
pub use oj_adapters::{WHISPER_KILL_GRACE, WHISPER_POLL_INTERVAL};

#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    pub whisper_binary: PathBuf,
    pub models_dir: PathBuf,
    pub whisper_model: String,
    pub whisper_cpu_threads: u32,
}

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("canceled")]
    Canceled,
    #[error("{0}")]
    Failed(String),
}

pub struct TranscribeOutcome {
    pub whisper_language: String,
    pub whisper_result: serde_json::Value,
}

/// Run the whisper binary once in a fire-and-wait mode, used both for the
/// language-detection probe and for the full transcription. `extra_args` are
/// appended after the shared model/thread/input flags.
fn spawn_whisper(
    config: &TranscriberConfig,
    input: &Path,
    extra_args: &[&str],
) -> std::io::Result<std::process::Child> {
    Command::new(&config.whisper_binary)
        .arg("--model")
        .arg(config.models_dir.join(&config.whisper_model))
        .arg("--threads")
        .arg(config.whisper_cpu_threads.to_string())
        .arg("--file")
        .arg(input)
        .args(extra_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

/// Send a POSIX signal to `pid` by shelling out to `kill`, the same idiom
/// the CLI uses to stop the daemon process itself.
fn send_signal(pid: u32, signal: &str) -> bool {
    Command::new("kill")
        .args([signal, &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Wait for `child` to exit, polling every [`WHISPER_POLL_INTERVAL`] and
/// aborting (SIGTERM, then SIGKILL after [`WHISPER_KILL_GRACE`]) if `cancel`
/// fires first.
fn wait_with_cancel(
    child: &mut std::process::Child,
    cancel: &CancelToken,
) -> Result<std::process::Output, TranscribeError> {
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|e| TranscribeError::Failed(format!("waiting for whisper child: {e}")))?
        {
            let mut output = std::process::Output {
                status,
                stdout: Vec::new(),
                stderr: Vec::new(),
            };
            if let Some(mut stdout) = child.stdout.take() {
                use std::io::Read;
                let _ = stdout.read_to_end(&mut output.stdout);
            }
            if let Some(mut stderr) = child.stderr.take() {
                use std::io::Read;
                let _ = stderr.read_to_end(&mut output.stderr);
            }
            return Ok(output);
        }

        if cancel.is_canceled() {
            let pid = child.id();
            send_signal(pid, "-15");
            let deadline = Instant::now() + WHISPER_KILL_GRACE;
            loop {
                if let Ok(Some(_)) = child.try_wait() {
                    break;
                }
                if Instant::now() >= deadline {
                    send_signal(pid, "-9");
                    let _ = child.wait();
                    break;
                }
                std::thread::sleep(WHISPER_POLL_INTERVAL);
            }
            return Err(TranscribeError::Canceled);
        }

        std::thread::sleep(WHISPER_POLL_INTERVAL);
    }
}

/// Probe the most likely spoken language from the first few seconds of
/// audio. Falls back to `"auto"` if the probe itself fails — a bad language
/// guess degrades quality, it shouldn't fail the whole job.
fn detect_language(config: &TranscriberConfig, input: &Path, cancel: &CancelToken) -> String {
    let mut child = match spawn_whisper(config, input, &["--detect-language"]) {
        Ok(child) => child,
        Err(_) => return "auto".to_string(),
    };
    match wait_with_cancel(&mut child, cancel) {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("auto")
                .to_string()
        }
        _ => "auto".to_string(),
    }
}

/// Run the full transcribe-to-completion pipeline for `entry`, whose audio
/// is staged at `Entry::staging_path(data_dir, &entry.uid)`.
pub fn transcribe(
    entry: &Entry,
    data_dir: &Path,
    config: &TranscriberConfig,
    cancel: &CancelToken,
) -> Result<TranscribeOutcome, TranscribeError> {
    if cancel.is_canceled() {
        return Err(TranscribeError::Canceled);
    }

    let input = Entry::staging_path(data_dir, &entry.uid);

    let whisper_language = detect_language(config, &input, cancel);
    if cancel.is_canceled() {
        return Err(TranscribeError::Canceled);
    }

    let mut extra_args = vec!["--language".to_string(), whisper_language.clone(), "--output-json".to_string()];
    if let Some(prompt) = entry.initial_prompt.as_deref() {
        extra_args.push("--prompt".to_string());
        extra_args.push(prompt.to_string());
    }
    let extra_args: Vec<&str> = extra_args.iter().map(String::as_str).collect();

    let mut child = spawn_whisper(config, &input, &extra_args)
        .map_err(|e| TranscribeError::Failed(format!("failed to start whisper: {e}")))?;
    let output = wait_with_cancel(&mut child, cancel)?;

    if !output.status.success() {
        return Err(TranscribeError::Failed(format!(
            "whisper exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let whisper_result: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
        TranscribeError::Failed(format!("whisper produced invalid JSON: {e}"))
    })?;

    Ok(TranscribeOutcome {
        whisper_language,
        whisper_result,
    })
}

#[cfg(test)]
#[path = "transcriber_tests.rs"]
mod tests;
