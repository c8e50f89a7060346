// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion-detection poller (C9b, §4.9b): the fallback path for CI
//! systems or agents that never push a completion signal. Scans `created`
//! checkpoints older than `min_age` and asks the CI adapter for each job's
//! current status.

use std::sync::Arc;

use e2epool_core::{FinalizeSource, FinalizeStatus};
use e2epool_store::CheckpointRepository;

use crate::checkpoint_service::CheckpointService;
use crate::env::Config;

pub struct Poller {
    pool: sqlx::PgPool,
    checkpoints: Arc<CheckpointService>,
    runner_registry: e2epool_store::SharedRunnerRegistry,
    min_age_seconds: i64,
    batch_size: i64,
}

impl Poller {
    pub fn new(
        pool: sqlx::PgPool,
        checkpoints: Arc<CheckpointService>,
        runner_registry: e2epool_store::SharedRunnerRegistry,
        config: &Config,
    ) -> Self {
        Self {
            pool,
            checkpoints,
            runner_registry,
            min_age_seconds: config.poller_min_age_seconds,
            batch_size: config.query_batch_size,
        }
    }

    /// Runs one scan, returning the number of checkpoints it pushed into
    /// finalize. Caller is responsible for the interval loop.
    pub async fn run_once(&self) -> Result<usize, e2epool_store::StoreError> {
        let cutoff = chrono::Utc::now() - chrono::Duration::seconds(self.min_age_seconds);
        let candidates =
            CheckpointRepository::created_older_than_min_age(&self.pool, cutoff, self.batch_size)
                .await?;

        let mut queued = 0;
        for checkpoint in candidates {
            let Ok(Some(runner)) = self.runner_registry.by_runner_id(&checkpoint.runner_id).await
            else {
                continue;
            };
            if !runner.has_ci_routing() {
                continue;
            }
            let Ok(adapter) =
                e2epool_ci::resolve(&runner.ci_adapter, &runner.ci_base_url, &runner.ci_token)
            else {
                continue;
            };

            let status = adapter.get_job_status(&checkpoint.job_id).await;
            if !status.is_terminal() {
                continue;
            }

            let finalize_status = match status {
                e2epool_ci::JobStatus::Success => FinalizeStatus::Success,
                e2epool_ci::JobStatus::Canceled => FinalizeStatus::Canceled,
                _ => FinalizeStatus::Failure,
            };

            match self
                .checkpoints
                .queue_finalize(
                    &checkpoint.runner_id,
                    &checkpoint.name,
                    finalize_status,
                    FinalizeSource::Poller,
                )
                .await
            {
                Ok(_) => queued += 1,
                Err(e) => tracing::warn!(
                    checkpoint_name = %checkpoint.name, error = %e, "poller failed to queue finalize"
                ),
            }
        }
        Ok(queued)
    }
}
