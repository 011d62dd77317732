// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by the store, scheduler, and transcriber.
//!
//! These are kinds, not wrapped foreign errors: each variant is something
//! the HTTP layer (outside this crate) translates directly into a status
//! code, and something the engine records as a terminal `Failed` reason.

use thiserror::Error;

/// Errors raised by the job-lifecycle core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("module capacity exceeded")]
    ModuleCapExceeded,

    #[error("self-care reject: {0}")]
    SelfCareReject(SelfCareReason),

    #[error("preprocessing failed: {0}")]
    PreprocessingFailed(String),

    #[error("engine failure: {0}")]
    EngineFailure(String),

    #[error("canceled")]
    Canceled,

    #[error("corrupted: {0}")]
    Corrupted(String),

    #[error("invalid field: {0}")]
    InvalidField(String),
}

/// Specific self-care gate that rejected a submission.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SelfCareReason {
    #[error("insufficient storage")]
    Storage,
    #[error("insufficient ram")]
    Ram,
    #[error("insufficient cpu")]
    Cpu,
    #[error("queue is full")]
    QueueFull,
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
