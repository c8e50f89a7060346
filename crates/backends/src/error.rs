// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("readiness wait timed out")]
    ReadinessTimeout,
    #[error("reset failed: {0}")]
    ResetFailed(String),
    #[error("command exec failed: {0}")]
    ExecFailed(String),
    #[error("agent channel error: {0}")]
    Channel(String),
    #[error("hypervisor error: {0}")]
    Hypervisor(String),
    #[error("hypervisor http error: {0}")]
    Http(#[from] reqwest::Error),
}
