// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint service (C7, §4.7): `create`, `queue_finalize`, `get_status`.
//! Every mutating call acquires the runner's advisory lock for the lifetime
//! of the state check + mutation, matching §5's "the lock is the protected
//! critical section" rule.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use e2epool_backends::RunnerExecutor;
use e2epool_core::{
    checkpoint_name, unix_now, valid_job_id, Checkpoint, CheckpointState, FinalizeSource,
    FinalizeStatus, OperationLogEntry, OperationResult,
};
use e2epool_store::{
    AuditLog, CheckpointRepository, FinalizeQueue, SharedRunnerRegistry, StoreError,
};
use rand::Rng;
use sqlx::PgPool;

use crate::error::ServiceError;

pub struct CheckpointService {
    pool: PgPool,
    runner_registry: SharedRunnerRegistry,
    executor: Arc<dyn RunnerExecutor>,
    finalize_cooldown_seconds: i64,
}

impl CheckpointService {
    pub fn new(
        pool: PgPool,
        runner_registry: SharedRunnerRegistry,
        executor: Arc<dyn RunnerExecutor>,
        finalize_cooldown_seconds: i64,
    ) -> Self {
        Self { pool, runner_registry, executor, finalize_cooldown_seconds }
    }

    /// §4.7 `create`.
    pub async fn create(
        &self,
        runner_id: &str,
        job_id: &str,
        caller_token: &str,
    ) -> Result<Checkpoint, ServiceError> {
        if !valid_job_id(job_id) {
            return Err(ServiceError::Validation(format!(
                "job_id {job_id:?} contains characters outside [A-Za-z0-9_.-]"
            )));
        }

        let runner = self
            .runner_registry
            .by_runner_id(runner_id)
            .await
            .map_err(ServiceError::from)?
            .ok_or(ServiceError::NotFound)?;
        if runner.token != caller_token {
            return Err(ServiceError::Forbidden);
        }

        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
        e2epool_store::acquire_lock(&mut tx, runner_id).await?;

        if CheckpointRepository::active_for_runner(&mut tx, runner_id).await?.is_some() {
            return Err(ServiceError::Conflict);
        }

        if let Some(last_finalized) =
            CheckpointRepository::most_recent_finalized_at(&mut tx, runner_id).await?
        {
            if Utc::now() - last_finalized < ChronoDuration::seconds(self.finalize_cooldown_seconds)
            {
                return Err(ServiceError::Cooldown);
            }
        }

        let name = checkpoint_name(job_id, unix_now(), rand::thread_rng().gen());
        let backend = e2epool_backends::resolve(runner.backend, self.executor.clone());

        let started_at = Utc::now();
        let create_outcome = backend.create_checkpoint(&runner, &name).await;
        let finished_at = Utc::now();

        if let Err(e) = create_outcome {
            // Transaction drops here without committing: no row inserted,
            // matching §4.7's "failure of step 6 -> no row inserted".
            return Err(ServiceError::Backend(e.to_string()));
        }

        let checkpoint = CheckpointRepository::insert(&mut tx, &name, runner_id, job_id).await?;
        tx.commit().await.map_err(StoreError::from)?;

        let _ = AuditLog::insert(
            &self.pool,
            &OperationLogEntry {
                checkpoint_name: name,
                runner_id: runner_id.to_string(),
                operation: "create".to_string(),
                backend: Some(runner.backend),
                detail: String::new(),
                result: OperationResult::Ok,
                started_at,
                finished_at,
            },
        )
        .await;

        Ok(checkpoint)
    }

    /// §4.7 `queue_finalize`.
    pub async fn queue_finalize(
        &self,
        runner_id: &str,
        checkpoint_name: &str,
        status: FinalizeStatus,
        source: FinalizeSource,
    ) -> Result<QueueFinalizeOutcome, ServiceError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
        e2epool_store::acquire_lock(&mut tx, runner_id).await?;

        let checkpoint = CheckpointRepository::for_update_by_name(&mut tx, checkpoint_name)
            .await?
            .ok_or(ServiceError::NotFound)?;
        if checkpoint.runner_id != runner_id {
            // Hide existence of checkpoints belonging to other runners.
            return Err(ServiceError::NotFound);
        }

        if checkpoint.state.is_terminal() {
            return Ok(QueueFinalizeOutcome::AlreadyFinalized);
        }
        if checkpoint.state == CheckpointState::FinalizeQueued {
            return Ok(QueueFinalizeOutcome::AlreadyQueued);
        }

        CheckpointRepository::mark_finalize_queued(&mut tx, checkpoint_name, status, source)
            .await?;

        if let Err(e) = FinalizeQueue::enqueue(&mut tx, checkpoint_name).await {
            // Rollback (drop without commit) on enqueue failure, per §4.7 step 5.
            return Err(ServiceError::Broker(e.to_string()));
        }

        tx.commit().await.map_err(StoreError::from)?;
        Ok(QueueFinalizeOutcome::Queued)
    }

    /// `GET /runner/readiness` (§6.1): a runner is ready when its agent
    /// channel is connected on some replica.
    pub async fn is_ready(&self, runner_id: &str) -> bool {
        self.executor.is_connected(runner_id).await
    }

    /// Resolves a job id to its active checkpoint, then delegates to
    /// `queue_finalize`. Used by the webhook handlers (§4.9c), which only
    /// ever see a job id in the provider's payload, never a checkpoint
    /// name or runner id.
    pub async fn queue_finalize_by_job_id(
        &self,
        job_id: &str,
        status: FinalizeStatus,
        source: FinalizeSource,
    ) -> Result<QueueFinalizeOutcome, ServiceError> {
        let checkpoint = CheckpointRepository::active_by_job_id(&self.pool, job_id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        self.queue_finalize(&checkpoint.runner_id, &checkpoint.name, status, source).await
    }

    /// §4.7 `get_status`. `caller_token` scope check mirrors `create`'s.
    pub async fn get_status(
        &self,
        checkpoint_name: &str,
        caller_token: &str,
    ) -> Result<Checkpoint, ServiceError> {
        let checkpoint = CheckpointRepository::by_name(&self.pool, checkpoint_name)
            .await?
            .ok_or(ServiceError::NotFound)?;
        let runner = self
            .runner_registry
            .by_runner_id(&checkpoint.runner_id)
            .await
            .map_err(ServiceError::from)?
            .ok_or(ServiceError::NotFound)?;
        if runner.token != caller_token {
            return Err(ServiceError::NotFound);
        }
        Ok(checkpoint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueFinalizeOutcome {
    Queued,
    AlreadyQueued,
    AlreadyFinalized,
}

impl QueueFinalizeOutcome {
    pub fn detail(self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::AlreadyQueued => "Already queued",
            Self::AlreadyFinalized => "Already finalized",
        }
    }
}
