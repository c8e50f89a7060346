// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciler (C11, §4.11): the net under the broker. Runs at startup and
//! every `reconcile_interval_seconds` to re-enqueue `finalize_queued`
//! checkpoints that have no corresponding live task row — the case where a
//! replica crashed between `mark_finalize_queued` and `FinalizeQueue::enqueue`
//! committing, or a broker row was lost some other way — and to release
//! locks held by finalize workers that died mid-task.

use e2epool_store::{CheckpointRepository, FinalizeQueue, StoreError};

use crate::env::Config;

pub struct Reconciler {
    pool: sqlx::PgPool,
    batch_size: i64,
    stale_lock_after: chrono::Duration,
}

impl Reconciler {
    pub fn new(pool: sqlx::PgPool, config: &Config) -> Self {
        Self {
            pool,
            batch_size: config.query_batch_size,
            stale_lock_after: chrono::Duration::from_std(config.finalize_task_hard_limit)
                .unwrap_or_else(|_| chrono::Duration::seconds(330)),
        }
    }

    /// Runs one reconciliation pass, returning `(requeued, stale_released)`.
    pub async fn run_once(&self) -> Result<(usize, u64), StoreError> {
        let stuck = CheckpointRepository::finalize_queued(&self.pool, self.batch_size).await?;

        let mut requeued = 0;
        for checkpoint in stuck {
            let mut tx = self.pool.begin().await?;
            if let Err(e) = FinalizeQueue::enqueue(&mut tx, &checkpoint.name).await {
                tracing::warn!(
                    checkpoint_name = %checkpoint.name, error = %e,
                    "reconciler failed to re-enqueue finalize_queued checkpoint"
                );
                continue;
            }
            tx.commit().await?;
            requeued += 1;
        }

        let released = FinalizeQueue::release_stale(&self.pool, self.stale_lock_after).await?;
        if released > 0 {
            tracing::info!(released, "reconciler released stale finalize task locks");
        }

        Ok((requeued, released))
    }
}
