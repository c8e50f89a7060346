// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The CI adapter trait (C5, §4.5): a capability set every supported CI
//! system implements — job-status lookup, runner-pause, runner-unpause.

use async_trait::async_trait;

use crate::error::CiAdapterError;

/// Canonical job status, collapsed from whatever vocabulary the upstream CI
/// system uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Running,
    Success,
    Failed,
    Canceled,
    /// Network error, or a status the adapter doesn't recognize. Retryable
    /// and non-terminal by construction — the poller (C9b) will try again
    /// next scan rather than treating this as a completion.
    Unknown,
}

e2epool_core::simple_display! {
    JobStatus {
        Running => "running",
        Success => "success",
        Failed => "failed",
        Canceled => "canceled",
        Unknown => "unknown",
    }
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled)
    }
}

/// Per-CI-system driver. GitLab is the reference implementation
/// ([`crate::gitlab::GitlabAdapter`]).
#[async_trait]
pub trait CiAdapter: Send + Sync + 'static {
    /// Looks up a job's current status. Network errors are swallowed and
    /// reported as [`JobStatus::Unknown`] rather than propagated — the
    /// poller treats "couldn't tell" and "still running" identically.
    async fn get_job_status(&self, job_id: &str) -> JobStatus;

    /// Pauses the CI-side runner so it stops picking up new jobs. A no-op
    /// at the call site whenever the registry row has no `ci_runner_id`
    /// (§4.5's "critical semantic") — that check belongs to the caller, not
    /// the adapter, so every adapter implementation can assume
    /// `ci_runner_id` is always present here.
    async fn pause_runner(&self, ci_runner_id: &str) -> Result<(), CiAdapterError>;

    /// Unpauses the CI-side runner. Must be idempotent: calling this on an
    /// already-unpaused runner succeeds silently (the finalize worker calls
    /// this from up to three code paths per §4.8).
    async fn unpause_runner(&self, ci_runner_id: &str) -> Result<(), CiAdapterError>;
}
