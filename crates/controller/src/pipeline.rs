// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pause -> reset -> readiness-wait -> unpause sequence shared by the
//! finalize worker (C8, §4.8) and the garbage collector (C10, §4.10). Both
//! callers hold their own advisory lock and decide the terminal state and
//! persistence path themselves; this module only drives the backend and CI
//! side effects and their idempotent triple-unpause.

use std::sync::Arc;
use std::time::Duration;

use e2epool_backends::RunnerExecutor;
use e2epool_core::{FinalizeStatus, Runner};

use crate::error::ServiceError;

/// Runs one reset cycle against `runner`. Pauses the CI-side runner first
/// (unless it has no CI routing, or the job already succeeded and there's
/// no cleanup command to run), resets the backend, waits for readiness on
/// anything but a clean success, then unpauses.
///
/// Unpause is attempted up to three times per §4.8: immediately after
/// `reset` returns (success or failure), and once more here if that first
/// attempt didn't land. Every attempt is tolerant of an already-unpaused
/// runner — the CI adapter contract requires `unpause_runner` to be
/// idempotent.
pub async fn run_reset_pipeline(
    runner: &Runner,
    checkpoint_name: &str,
    status: FinalizeStatus,
    executor: Arc<dyn RunnerExecutor>,
    readiness_timeout: Duration,
) -> Result<(), ServiceError> {
    let ci_adapter = if runner.has_ci_routing() {
        Some(
            e2epool_ci::resolve(&runner.ci_adapter, &runner.ci_base_url, &runner.ci_token)
                .map_err(|e| ServiceError::CiAdapter(e.to_string()))?,
        )
    } else {
        None
    };
    let ci_runner_id = runner.ci_runner_id.clone();

    let mut paused = false;
    let mut unpaused = false;

    let result: Result<(), ServiceError> = async {
        if let (Some(adapter), Some(id)) = (ci_adapter.as_ref(), ci_runner_id.as_deref()) {
            if status != FinalizeStatus::Success || runner.cleanup_cmd.is_some() {
                adapter.pause_runner(id).await.map_err(|e| ServiceError::CiAdapter(e.to_string()))?;
                paused = true;
            }
        }

        let backend = e2epool_backends::resolve(runner.backend, executor);
        let reset_outcome = backend.reset(runner, checkpoint_name, status).await;

        if paused {
            if let (Some(adapter), Some(id)) = (ci_adapter.as_ref(), ci_runner_id.as_deref()) {
                match adapter.unpause_runner(id).await {
                    Ok(()) => unpaused = true,
                    Err(e) => tracing::error!(
                        checkpoint_name, error = %e, "inner unpause failed"
                    ),
                }
            }
        }

        reset_outcome.map_err(|e| ServiceError::Backend(e.to_string()))?;

        if status != FinalizeStatus::Success {
            backend
                .readiness_wait(runner, readiness_timeout)
                .await
                .map_err(|e| ServiceError::Backend(e.to_string()))?;
        }

        Ok(())
    }
    .await;

    if paused && !unpaused {
        if let (Some(adapter), Some(id)) = (ci_adapter.as_ref(), ci_runner_id.as_deref()) {
            if let Err(e) = adapter.unpause_runner(id).await {
                tracing::error!(
                    checkpoint_name, error = %e,
                    "last-resort unpause also failed; operator intervention required"
                );
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use e2epool_backends::ExecResult;
    use e2epool_core::Runner;

    use super::*;

    struct FakeExecutor {
        exit_code: i32,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl RunnerExecutor for FakeExecutor {
        async fn exec(
            &self,
            _runner_id: &str,
            cmd: &str,
            _timeout: Duration,
        ) -> Result<ExecResult, e2epool_backends::BackendError> {
            self.calls.lock().unwrap().push(cmd.to_string());
            Ok(ExecResult { exit_code: self.exit_code, stdout: String::new(), stderr: String::new() })
        }

        async fn is_connected(&self, _runner_id: &str) -> bool {
            true
        }
    }

    fn bare_metal_runner() -> Runner {
        Runner::builder().reset_cmd("/opt/reset.sh").readiness_cmd("/opt/ready.sh").build()
    }

    #[tokio::test]
    async fn failure_status_runs_reset_cmd_and_waits_for_readiness() {
        let executor = Arc::new(FakeExecutor { exit_code: 0, calls: Mutex::new(Vec::new()) });
        let runner = bare_metal_runner();

        let result = run_reset_pipeline(
            &runner,
            "ckpt-1",
            FinalizeStatus::Failure,
            executor.clone(),
            Duration::from_secs(1),
        )
        .await;

        assert!(result.is_ok());
        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), ["/opt/reset.sh", "/opt/ready.sh"]);
    }

    #[tokio::test]
    async fn success_status_skips_reset_cmd_when_no_cleanup_cmd() {
        let executor = Arc::new(FakeExecutor { exit_code: 0, calls: Mutex::new(Vec::new()) });
        let runner = bare_metal_runner();

        let result = run_reset_pipeline(
            &runner,
            "ckpt-1",
            FinalizeStatus::Success,
            executor.clone(),
            Duration::from_secs(1),
        )
        .await;

        assert!(result.is_ok());
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_failure_propagates_as_backend_error() {
        let executor = Arc::new(FakeExecutor { exit_code: 1, calls: Mutex::new(Vec::new()) });
        let runner = bare_metal_runner();

        let result = run_reset_pipeline(
            &runner,
            "ckpt-1",
            FinalizeStatus::Failure,
            executor,
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(result, Err(ServiceError::Backend(_))));
    }
}
