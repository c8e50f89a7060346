// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The seam between backend drivers (C4) and the agent channel (C6).
//!
//! Backend drivers need to run commands on a runner host and check whether
//! its channel is connected, but must not depend on `e2epool-channel`
//! directly (that crate depends on the store and the controller's
//! cross-replica dispatch, which would make this a cycle). Instead
//! `e2epool-channel` implements [`RunnerExecutor`] and the controller wires
//! the two together at startup.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BackendError;

#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs commands on, and checks connectivity of, a runner host's agent
/// channel (§4.6's `exec` and `ready_probe` request types).
#[async_trait]
pub trait RunnerExecutor: Send + Sync + 'static {
    /// Executes `cmd` on the named runner's host, bounded by `timeout`.
    async fn exec(
        &self,
        runner_id: &str,
        cmd: &str,
        timeout: Duration,
    ) -> Result<ExecResult, BackendError>;

    /// Whether the runner currently has a live agent channel connection.
    async fn is_connected(&self, runner_id: &str) -> bool;
}
