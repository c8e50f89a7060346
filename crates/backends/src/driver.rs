// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The backend driver trait (C4, §4.4): the capability set both the
//! hypervisor and bare-metal variants expose to the finalize pipeline.

use std::time::Duration;

use async_trait::async_trait;
use e2epool_core::{FinalizeStatus, Runner};

use crate::error::BackendError;

/// Default readiness poll interval (§4.4).
pub const READINESS_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[async_trait]
pub trait BackendDriver: Send + Sync + 'static {
    /// Performs whatever backend-side action makes the checkpoint durable
    /// (a hypervisor snapshot; a no-op for bare metal, where the row itself
    /// is the checkpoint).
    async fn create_checkpoint(&self, runner: &Runner, checkpoint_name: &str) -> Result<(), BackendError>;

    /// Resets the runner host back to a clean state per `status`: cleanup
    /// on success, full rollback/reset on failure or cancellation.
    async fn reset(
        &self,
        runner: &Runner,
        checkpoint_name: &str,
        status: FinalizeStatus,
    ) -> Result<(), BackendError>;

    /// Polls until the runner host is ready to accept new jobs, or the
    /// timeout elapses.
    async fn readiness_wait(&self, runner: &Runner, timeout: Duration) -> Result<(), BackendError>;
}
