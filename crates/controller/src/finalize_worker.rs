// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Finalize worker (C8, §4.8): drains [`e2epool_store::FinalizeQueue`],
//! running each claimed checkpoint through [`crate::pipeline::run_reset_pipeline`].
//! The per-runner advisory lock is held across the whole pipeline (§5) by
//! keeping one transaction open for the duration of the call; a side-effect
//! failure drops that transaction unrolled-back and releases the task so
//! the next poll redelivers it.

use std::sync::Arc;

use chrono::Utc;
use e2epool_backends::RunnerExecutor;
use e2epool_core::{CheckpointState, OperationLogEntry, OperationResult};
use e2epool_store::{AuditLog, CheckpointRepository, FinalizeQueue, FinalizeTask, SharedRunnerRegistry};

use crate::error::ServiceError;
use crate::pipeline::run_reset_pipeline;

pub struct FinalizeWorker {
    pool: sqlx::PgPool,
    runner_registry: SharedRunnerRegistry,
    executor: Arc<dyn RunnerExecutor>,
    readiness_timeout: std::time::Duration,
    worker_id: String,
}

/// What happened to a claimed task, for the caller's ack/release decision.
enum ProcessOutcome {
    Finalized(CheckpointState),
    AlreadyTerminal,
    NotYetQueued,
    MissingRow,
}

impl FinalizeWorker {
    pub fn new(
        pool: sqlx::PgPool,
        runner_registry: SharedRunnerRegistry,
        executor: Arc<dyn RunnerExecutor>,
        readiness_timeout: std::time::Duration,
        worker_id: impl Into<String>,
    ) -> Self {
        Self { pool, runner_registry, executor, readiness_timeout, worker_id: worker_id.into() }
    }

    /// Claims and processes at most one task. Returns `true` if a task was
    /// claimed (regardless of outcome), `false` if the queue was empty.
    pub async fn run_once(&self) -> Result<bool, ServiceError> {
        let Some(task) = FinalizeQueue::claim_next(&self.pool, &self.worker_id).await? else {
            return Ok(false);
        };

        match self.process(&task).await {
            Ok(ProcessOutcome::Finalized(_))
            | Ok(ProcessOutcome::AlreadyTerminal)
            | Ok(ProcessOutcome::NotYetQueued)
            | Ok(ProcessOutcome::MissingRow) => {
                FinalizeQueue::ack(&self.pool, task.id).await?;
            }
            Err(e) => {
                tracing::error!(
                    checkpoint_name = %task.checkpoint_name,
                    error = %e,
                    "finalize task failed; releasing for redelivery"
                );
                FinalizeQueue::release(&self.pool, task.id).await?;
            }
        }
        Ok(true)
    }

    async fn process(&self, task: &FinalizeTask) -> Result<ProcessOutcome, ServiceError> {
        let Some(preview) = CheckpointRepository::by_name(&self.pool, &task.checkpoint_name).await?
        else {
            tracing::warn!(checkpoint_name = %task.checkpoint_name, "finalize task has no matching checkpoint row");
            return Ok(ProcessOutcome::MissingRow);
        };
        let runner_id = preview.runner_id.clone();

        let mut tx = self.pool.begin().await.map_err(e2epool_store::StoreError::from)?;
        e2epool_store::acquire_lock(&mut tx, &runner_id).await?;

        let cp = CheckpointRepository::for_update_by_name(&mut tx, &task.checkpoint_name)
            .await?
            .ok_or(ServiceError::NotFound)?;

        match cp.state {
            CheckpointState::Reset | CheckpointState::Deleted | CheckpointState::GcReset => {
                tx.commit().await.map_err(e2epool_store::StoreError::from)?;
                return Ok(ProcessOutcome::AlreadyTerminal);
            }
            CheckpointState::Created => {
                // By construction `queue_finalize` enqueues inside the same
                // transaction that writes `finalize_queued`, so a worker
                // should never observe this. Kept defensively per §4.8.
                tracing::warn!(checkpoint_name = %cp.name, "finalize task claimed while checkpoint still created");
                tx.commit().await.map_err(e2epool_store::StoreError::from)?;
                return Ok(ProcessOutcome::NotYetQueued);
            }
            CheckpointState::FinalizeQueued => {}
        }

        let runner = self
            .runner_registry
            .by_runner_id(&runner_id)
            .await
            .map_err(ServiceError::from)?
            .ok_or(ServiceError::NotFound)?;
        let status = cp.finalize_status.ok_or_else(|| {
            ServiceError::Validation("finalize_queued checkpoint missing finalize_status".to_string())
        })?;

        let started_at = Utc::now();
        let pipeline_result =
            run_reset_pipeline(&runner, &cp.name, status, self.executor.clone(), self.readiness_timeout)
                .await;
        let finished_at = Utc::now();

        match pipeline_result {
            Ok(()) => {
                let terminal = if status == e2epool_core::FinalizeStatus::Success {
                    CheckpointState::Deleted
                } else {
                    CheckpointState::Reset
                };
                CheckpointRepository::mark_terminal(&mut tx, &cp.name, terminal).await?;
                tx.commit().await.map_err(e2epool_store::StoreError::from)?;

                let _ = AuditLog::insert(
                    &self.pool,
                    &OperationLogEntry {
                        checkpoint_name: cp.name.clone(),
                        runner_id,
                        operation: "finalize".to_string(),
                        backend: Some(runner.backend),
                        detail: String::new(),
                        result: OperationResult::Ok,
                        started_at,
                        finished_at,
                    },
                )
                .await;

                Ok(ProcessOutcome::Finalized(terminal))
            }
            Err(e) => {
                // `tx` is dropped (rolled back) here without committing: the
                // checkpoint stays `finalize_queued` so the released task
                // can be retried from a clean slate.
                let _ = AuditLog::insert(
                    &self.pool,
                    &OperationLogEntry {
                        checkpoint_name: cp.name.clone(),
                        runner_id,
                        operation: "finalize".to_string(),
                        backend: Some(runner.backend),
                        detail: e.to_string(),
                        result: OperationResult::Error,
                        started_at,
                        finished_at,
                    },
                )
                .await;
                Err(e)
            }
        }
    }
}
