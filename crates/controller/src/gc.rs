// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Garbage collector (C10, §4.10): reaps `created` checkpoints that outlive
//! `checkpoint_ttl_seconds` without ever reaching `finalize_queued` — a job
//! that never posted completion, an agent that never reconnected, a dead
//! CI pipeline. GC writes `gc_reset` directly from `created`, bypassing the
//! finalize queue entirely, and always resets as a failure.

use std::sync::Arc;

use chrono::Utc;
use e2epool_backends::RunnerExecutor;
use e2epool_core::{CheckpointState, FinalizeStatus, OperationLogEntry, OperationResult};
use e2epool_store::{AuditLog, CheckpointRepository, SharedRunnerRegistry};

use crate::env::Config;
use crate::error::ServiceError;
use crate::pipeline::run_reset_pipeline;

pub struct GarbageCollector {
    pool: sqlx::PgPool,
    runner_registry: SharedRunnerRegistry,
    executor: Arc<dyn RunnerExecutor>,
    ttl_seconds: i64,
    batch_size: i64,
    readiness_timeout: std::time::Duration,
}

impl GarbageCollector {
    pub fn new(
        pool: sqlx::PgPool,
        runner_registry: SharedRunnerRegistry,
        executor: Arc<dyn RunnerExecutor>,
        config: &Config,
    ) -> Self {
        Self {
            pool,
            runner_registry,
            executor,
            ttl_seconds: config.checkpoint_ttl_seconds,
            batch_size: config.query_batch_size,
            readiness_timeout: config.readiness_timeout,
        }
    }

    /// Runs one scan, returning the number of checkpoints reset.
    pub async fn run_once(&self) -> Result<usize, ServiceError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.ttl_seconds);
        let candidates =
            CheckpointRepository::created_older_than(&self.pool, cutoff, self.batch_size).await?;

        let mut reaped = 0;
        for checkpoint in candidates {
            match self.reap_one(&checkpoint.name, &checkpoint.runner_id).await {
                Ok(true) => reaped += 1,
                Ok(false) => {}
                Err(e) => tracing::error!(
                    checkpoint_name = %checkpoint.name, error = %e, "gc failed to reap checkpoint"
                ),
            }
        }
        Ok(reaped)
    }

    async fn reap_one(&self, checkpoint_name: &str, runner_id: &str) -> Result<bool, ServiceError> {
        let mut tx = self.pool.begin().await.map_err(e2epool_store::StoreError::from)?;
        e2epool_store::acquire_lock(&mut tx, runner_id).await?;

        let cp = match e2epool_store::CheckpointRepository::for_update_by_name(&mut tx, checkpoint_name)
            .await?
        {
            Some(cp) if cp.state == CheckpointState::Created => cp,
            _ => {
                // Already moved on (finalized, or raced with queue_finalize)
                // since the outer scan ran; nothing to do.
                tx.commit().await.map_err(e2epool_store::StoreError::from)?;
                return Ok(false);
            }
        };

        let runner = self
            .runner_registry
            .by_runner_id(runner_id)
            .await
            .map_err(ServiceError::from)?
            .ok_or(ServiceError::NotFound)?;

        let started_at = Utc::now();
        run_reset_pipeline(
            &runner,
            &cp.name,
            FinalizeStatus::Failure,
            self.executor.clone(),
            self.readiness_timeout,
        )
        .await?;
        let finished_at = Utc::now();

        CheckpointRepository::mark_terminal(&mut tx, &cp.name, CheckpointState::GcReset).await?;
        tx.commit().await.map_err(e2epool_store::StoreError::from)?;

        let _ = AuditLog::insert(
            &self.pool,
            &OperationLogEntry {
                checkpoint_name: cp.name,
                runner_id: runner_id.to_string(),
                operation: "gc_reset".to_string(),
                backend: Some(runner.backend),
                detail: String::new(),
                result: OperationResult::Ok,
                started_at,
                finished_at,
            },
        )
        .await;

        Ok(true)
    }
}
