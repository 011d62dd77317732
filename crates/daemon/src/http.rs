// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The HTTP surface: one axum router implementing every route in the
//! external interface. Basic auth gates every route; state (the Store, the
//! cancellation registry, the self-care gate) is threaded through via
//! axum's `State` extractor rather than any global.

use axum::extract::{Multipart, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use oj_adapters::{parse_segments, render_captions, CaptionFormat, SelfCareGate};
use oj_core::{
    Clock, CoreError, Entry, EntryConfig, EntryId, EntryStatus, IdGen, Module, ModuleId,
    SequentialIdGen, UuidIdGen, DEFAULT_FILE_MODULE_ID,
};
use oj_engine::CancelRegistry;
use oj_storage::{Store, StoreError};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// `IdGen` carries `Clone` as a supertrait, which rules out a trait object;
/// this is the small closed set of generators the daemon actually needs.
#[derive(Clone)]
pub enum IdSource {
    Uuid(UuidIdGen),
    Sequential(SequentialIdGen),
}

impl IdSource {
    fn next(&self) -> String {
        match self {
            IdSource::Uuid(g) => g.next(),
            IdSource::Sequential(g) => g.next(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub cancel_registry: Arc<CancelRegistry>,
    pub clock: Arc<dyn Clock>,
    pub self_care: Arc<SelfCareGate>,
    pub id_gen: IdSource,
    pub data_dir: PathBuf,
    pub login_username: String,
    pub login_password: String,
    pub parallel_workers: usize,
    pub running_jobs: Arc<AtomicUsize>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/transcribe", post(submit_transcription).get(get_caption).delete(delete_job))
        .route("/status", get(get_status))
        .route("/status/system", get(get_system_status))
        .route("/language", get(get_language))
        .route("/model", get(get_model))
        .route("/module/opencast", post(create_opencast_module))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_basic_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_basic_auth(
    State(state): State<AppState>,
    TypedHeader(Authorization(basic)): TypedHeader<Authorization<Basic>>,
    request: Request,
    next: Next,
) -> Response {
    if basic.username() == state.login_username && basic.password() == state.login_password {
        next.run(request).await
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"}))).into_response()
    }
}

async fn liveness() -> Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "unknown job id")
}

#[derive(Debug, Deserialize)]
struct IdQuery {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscribeQuery {
    id: Option<String>,
    format: Option<String>,
}

async fn submit_transcription(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut priority: Option<i32> = None;
    let mut file_bytes: Option<axum::body::Bytes> = None;
    let mut module_id: Option<String> = None;
    let mut link: Option<String> = None;
    let mut title: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid multipart body: {e}")),
        };
        match field.name().unwrap_or("") {
            "priority" => {
                if let Ok(text) = field.text().await {
                    priority = text.trim().parse().ok();
                }
            }
            "file" => {
                file_bytes = field.bytes().await.ok();
            }
            "module_id" => module_id = field.text().await.ok(),
            "link" => link = field.text().await.ok(),
            "title" => title = field.text().await.ok(),
            _ => {}
        }
    }

    let Some(priority) = priority else {
        return error_response(StatusCode::BAD_REQUEST, "missing or invalid priority");
    };

    let (module_uid, source_url) = match (&file_bytes, &module_id, &link) {
        (Some(_), _, _) => (ModuleId::new(DEFAULT_FILE_MODULE_ID), None),
        (None, Some(mid), Some(url)) => (ModuleId::new(mid.clone()), Some(url.clone())),
        _ => {
            return error_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "request must include either a file or module, module_id, and link",
            )
        }
    };

    if state.store.get_module(module_uid.as_str()).is_none() {
        return error_response(StatusCode::BAD_REQUEST, format!("unknown module {module_uid}"));
    }

    let queue_length = state.store.stats().queue_length;
    let gate = state.self_care.clone();
    let check = tokio::task::spawn_blocking(move || gate.check(queue_length)).await;
    match check {
        Ok(Ok(())) => {}
        Ok(Err(reason)) => return self_care_rejection(reason),
        Err(_) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "self-care check panicked"),
    }

    let now = state.clock.epoch_secs();
    let uid = EntryId::new(state.id_gen.next());

    if let Some(bytes) = &file_bytes {
        let dest = Entry::staging_path(&state.data_dir, &uid);
        if let Some(parent) = dest.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("failed to stage file: {e}"));
            }
        }
        if let Err(e) = std::fs::write(&dest, bytes) {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("failed to stage file: {e}"));
        }
    }

    let entry = Entry::new(EntryConfig {
        uid: uid.clone(),
        module_uid,
        priority,
        initial_prompt: title,
        source_url,
        created_at: now,
    });

    match state.store.submit_entry(entry) {
        Ok(true) => {
            info!(job = %uid, "job accepted");
            (StatusCode::CREATED, Json(json!({"jobId": uid.as_str()}))).into_response()
        }
        Ok(false) => {
            cleanup_staged_file(&state.data_dir, &uid);
            error_response(StatusCode::TOO_MANY_REQUESTS, "module capacity exceeded")
        }
        Err(e) => {
            cleanup_staged_file(&state.data_dir, &uid);
            store_error_response(e)
        }
    }
}

fn cleanup_staged_file(data_dir: &std::path::Path, uid: &EntryId) {
    let path = Entry::staging_path(data_dir, uid);
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

fn self_care_rejection(reason: oj_core::SelfCareReason) -> Response {
    use oj_core::SelfCareReason;
    let message = match reason {
        SelfCareReason::Storage => "Insufficient Storage",
        SelfCareReason::Ram => "Insufficient RAM",
        SelfCareReason::Cpu => "Insufficient CPU",
        SelfCareReason::QueueFull => "The queue is full",
    };
    error_response(StatusCode::INSUFFICIENT_STORAGE, message)
}

fn store_error_response(e: StoreError) -> Response {
    match e {
        StoreError::Core(CoreError::NotFound(msg)) => error_response(StatusCode::BAD_REQUEST, msg),
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

async fn get_caption(State(state): State<AppState>, Query(params): Query<TranscribeQuery>) -> Response {
    let Some(id) = params.id else {
        return error_response(StatusCode::BAD_REQUEST, "missing id");
    };
    let Some(entry) = state.store.load_job(&id) else {
        return not_found();
    };
    let Some(format) = params.format.as_deref().and_then(CaptionFormat::parse) else {
        return error_response(StatusCode::OK, "unsupported format");
    };
    let Some(result) = entry.whisper_result.as_ref() else {
        return error_response(StatusCode::OK, "job not ready");
    };

    let segments = match parse_segments(result) {
        Ok(s) => s,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    match render_captions(format, &segments) {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn delete_job(State(state): State<AppState>, Query(params): Query<IdQuery>) -> Response {
    let Some(id) = params.id else {
        return error_response(StatusCode::BAD_REQUEST, "missing id");
    };
    let Some(entry) = state.store.load_job(&id) else {
        return not_found();
    };
    let uid = entry.uid.clone();

    match entry.status {
        EntryStatus::Prepared | EntryStatus::Processing => {
            error_response(StatusCode::OK, "Job currently processing")
        }
        EntryStatus::Queued => {
            let now = state.clock.epoch_secs();
            if let Err(e) = state.store.remove_from_queue(&uid) {
                return store_error_response(e);
            }
            if let Err(e) = state.store.delete_job(&uid) {
                return store_error_response(e);
            }
            if let Err(e) = state.store.update_module_counters(&entry.module_uid, -1, now) {
                warn!(job = %uid, error = %e, "failed to decrement module counters on delete");
            }
            (StatusCode::OK, "OK").into_response()
        }
        EntryStatus::Completed | EntryStatus::Failed | EntryStatus::Canceled => {
            if let Err(e) = state.store.delete_job(&uid) {
                return store_error_response(e);
            }
            (StatusCode::OK, "OK").into_response()
        }
    }
}

async fn get_status(State(state): State<AppState>, Query(params): Query<IdQuery>) -> Response {
    let Some(id) = params.id else {
        return error_response(StatusCode::BAD_REQUEST, "missing id");
    };
    match state.store.load_job(&id) {
        Some(entry) => (
            StatusCode::OK,
            Json(json!({"jobId": entry.uid.as_str(), "status": entry.status.external_name()})),
        )
            .into_response(),
        None => not_found(),
    }
}

async fn get_system_status(State(state): State<AppState>) -> Response {
    let gate = state.self_care.clone();
    let gauges = match tokio::task::spawn_blocking(move || gate.gauges()).await {
        Ok(g) => g,
        Err(_) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "gauge sampling panicked"),
    };
    let stats = state.store.stats();
    (
        StatusCode::OK,
        Json(json!({
            "disk_usage_ratio": gauges.disk_usage_ratio,
            "ram_usage_percent": gauges.ram_usage_percent,
            "cpu_usage_percent": gauges.cpu_usage_percent,
            "queue_length": stats.queue_length,
            "running_jobs": state.running_jobs.load(Ordering::SeqCst),
            "parallel_jobs": state.parallel_workers,
        })),
    )
        .into_response()
}

async fn get_language(State(state): State<AppState>, Query(params): Query<IdQuery>) -> Response {
    let Some(id) = params.id else {
        return error_response(StatusCode::BAD_REQUEST, "missing id");
    };
    match state.store.load_job(&id) {
        Some(entry) => match entry.whisper_language {
            Some(language) => {
                (StatusCode::OK, Json(json!({"jobId": entry.uid.as_str(), "language": language}))).into_response()
            }
            None => error_response(StatusCode::OK, "job not processed"),
        },
        None => not_found(),
    }
}

async fn get_model(State(state): State<AppState>, Query(params): Query<IdQuery>) -> Response {
    let Some(id) = params.id else {
        return error_response(StatusCode::BAD_REQUEST, "missing id");
    };
    match state.store.load_job(&id) {
        Some(entry) => match entry.whisper_model {
            Some(model) => (StatusCode::OK, Json(json!({"jobId": entry.uid.as_str(), "model": model}))).into_response(),
            None => error_response(StatusCode::OK, "job not processed"),
        },
        None => not_found(),
    }
}

#[derive(Debug, Deserialize)]
struct CreateOpencastModuleRequest {
    max_queue_length: u32,
}

async fn create_opencast_module(State(state): State<AppState>, Json(body): Json<CreateOpencastModuleRequest>) -> Response {
    let now = state.clock.epoch_secs();
    let module_uid = ModuleId::new(state.id_gen.next());
    let module = Module::new_opencast(module_uid.clone(), body.max_queue_length, now);
    match state.store.add_module(module) {
        Ok(()) => {
            info!(module = %module_uid, cap = body.max_queue_length, "opencast module registered");
            (StatusCode::CREATED, Json(json!({"moduleId": module_uid.as_str()}))).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
