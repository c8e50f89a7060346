// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bare-metal backend (§4.4): the checkpoint row *is* the checkpoint, so
//! `create_checkpoint` is a no-op. `reset` shells out to `cleanup_cmd` or
//! `reset_cmd` on the runner host via the agent channel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use e2epool_core::{FinalizeStatus, Runner};

use crate::driver::{BackendDriver, READINESS_POLL_INTERVAL};
use crate::error::BackendError;
use crate::executor::RunnerExecutor;

const EXEC_TIMEOUT: Duration = Duration::from_secs(120);

pub struct BareMetalBackend {
    executor: Arc<dyn RunnerExecutor>,
}

impl BareMetalBackend {
    pub fn new(executor: Arc<dyn RunnerExecutor>) -> Self {
        Self { executor }
    }

    async fn run(&self, runner: &Runner, cmd: &str) -> Result<(), BackendError> {
        let result = self.executor.exec(&runner.runner_id, cmd, EXEC_TIMEOUT).await?;
        if result.succeeded() {
            Ok(())
        } else {
            Err(BackendError::ExecFailed(format!(
                "{cmd:?} exited {} (stderr: {})",
                result.exit_code, result.stderr
            )))
        }
    }
}

#[async_trait]
impl BackendDriver for BareMetalBackend {
    async fn create_checkpoint(&self, _runner: &Runner, _checkpoint_name: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn reset(
        &self,
        runner: &Runner,
        _checkpoint_name: &str,
        status: FinalizeStatus,
    ) -> Result<(), BackendError> {
        if status == FinalizeStatus::Success {
            if let Some(cleanup_cmd) = &runner.cleanup_cmd {
                self.run(runner, cleanup_cmd).await?;
            }
            return Ok(());
        }

        let reset_cmd = runner
            .reset_cmd
            .as_deref()
            .ok_or_else(|| BackendError::ResetFailed("reset_cmd not configured".to_string()))?;
        self.run(runner, reset_cmd).await
    }

    async fn readiness_wait(&self, runner: &Runner, timeout: Duration) -> Result<(), BackendError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.executor.is_connected(&runner.runner_id).await {
                let ready = match &runner.readiness_cmd {
                    Some(cmd) => self
                        .executor
                        .exec(&runner.runner_id, cmd, EXEC_TIMEOUT)
                        .await
                        .map(|r| r.succeeded())
                        .unwrap_or(false),
                    None => true,
                };
                if ready {
                    return Ok(());
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BackendError::ReadinessTimeout);
            }
            tokio::time::sleep(READINESS_POLL_INTERVAL.min(remaining)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecResult;
    use std::sync::Mutex;

    struct FakeExecutor {
        connected: bool,
        exec_exit_code: i32,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RunnerExecutor for FakeExecutor {
        async fn exec(&self, _runner_id: &str, cmd: &str, _timeout: Duration) -> Result<ExecResult, BackendError> {
            self.calls.lock().unwrap().push(cmd.to_string());
            Ok(ExecResult { exit_code: self.exec_exit_code, stdout: String::new(), stderr: String::new() })
        }

        async fn is_connected(&self, _runner_id: &str) -> bool {
            self.connected
        }
    }

    fn runner() -> Runner {
        e2epool_core::Runner::builder()
            .backend(e2epool_core::BackendKind::BareMetal)
            .reset_cmd("/opt/e2epool/reset.sh")
            .cleanup_cmd("/opt/e2epool/cleanup.sh")
            .build()
    }

    #[tokio::test]
    async fn success_runs_cleanup_cmd_only() {
        let executor =
            Arc::new(FakeExecutor { connected: true, exec_exit_code: 0, calls: Mutex::new(Vec::new()) });
        let backend = BareMetalBackend::new(executor.clone());
        backend.reset(&runner(), "job-demo-1-aaaaaaaa", FinalizeStatus::Success).await.unwrap();
        assert_eq!(*executor.calls.lock().unwrap(), vec!["/opt/e2epool/cleanup.sh".to_string()]);
    }

    #[tokio::test]
    async fn failure_runs_reset_cmd() {
        let executor =
            Arc::new(FakeExecutor { connected: true, exec_exit_code: 0, calls: Mutex::new(Vec::new()) });
        let backend = BareMetalBackend::new(executor.clone());
        backend.reset(&runner(), "job-demo-1-aaaaaaaa", FinalizeStatus::Failure).await.unwrap();
        assert_eq!(*executor.calls.lock().unwrap(), vec!["/opt/e2epool/reset.sh".to_string()]);
    }

    #[tokio::test]
    async fn failure_without_reset_cmd_configured_fails() {
        let executor =
            Arc::new(FakeExecutor { connected: true, exec_exit_code: 0, calls: Mutex::new(Vec::new()) });
        let backend = BareMetalBackend::new(executor);
        let mut r = runner();
        r.reset_cmd = None;
        let result = backend.reset(&r, "job-demo-1-aaaaaaaa", FinalizeStatus::Failure).await;
        assert!(matches!(result, Err(BackendError::ResetFailed(_))));
    }

    #[tokio::test]
    async fn reset_cmd_nonzero_exit_is_reset_failed() {
        let executor =
            Arc::new(FakeExecutor { connected: true, exec_exit_code: 1, calls: Mutex::new(Vec::new()) });
        let backend = BareMetalBackend::new(executor);
        let result = backend.reset(&runner(), "job-demo-1-aaaaaaaa", FinalizeStatus::Failure).await;
        assert!(matches!(result, Err(BackendError::ExecFailed(_))));
    }

    #[tokio::test]
    async fn readiness_wait_succeeds_immediately_without_readiness_cmd() {
        let executor =
            Arc::new(FakeExecutor { connected: true, exec_exit_code: 0, calls: Mutex::new(Vec::new()) });
        let backend = BareMetalBackend::new(executor);
        backend.readiness_wait(&runner(), Duration::from_millis(50)).await.unwrap();
    }

    #[tokio::test]
    async fn readiness_wait_times_out_when_never_connected() {
        let executor =
            Arc::new(FakeExecutor { connected: false, exec_exit_code: 0, calls: Mutex::new(Vec::new()) });
        let backend = BareMetalBackend::new(executor);
        let result = backend.readiness_wait(&runner(), Duration::from_millis(10)).await;
        assert!(matches!(result, Err(BackendError::ReadinessTimeout)));
    }
}
