// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Finalize task queue (the C8 broker, §4.8/§5): a durable, at-least-once
//! queue built directly on the Postgres connection the store already
//! requires, rather than a second stateful dependency. `claim_next` uses
//! `FOR UPDATE SKIP LOCKED` so any number of finalize workers, on any
//! replica, can poll concurrently without contending on the same row.
//! Late-ack: a claimed row stays locked until [`ack`] (success) or
//! [`release`] (retry); [`release_stale`] is the reconciler's (C11) net for
//! workers that died mid-task.

use chrono::Duration;
use sqlx::PgPool;

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct FinalizeTask {
    pub id: i64,
    pub checkpoint_name: String,
    pub attempts: i32,
}

pub struct FinalizeQueue;

impl FinalizeQueue {
    /// Enqueues within the caller's transaction, so a `queue_finalize`
    /// service call that rolls back its state update also rolls back the
    /// enqueue (§4.7 step 5).
    pub async fn enqueue(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        checkpoint_name: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO finalize_tasks (checkpoint_name) VALUES ($1)")
            .bind(checkpoint_name)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Claims and locks the oldest unlocked task, if any, recording
    /// `worker_id` so staleness can be attributed.
    pub async fn claim_next(
        pool: &PgPool,
        worker_id: &str,
    ) -> Result<Option<FinalizeTask>, StoreError> {
        let mut tx = pool.begin().await?;
        let claimed: Option<(i64, String, i32)> = sqlx::query_as(
            r#"
            SELECT id, checkpoint_name, attempts
            FROM finalize_tasks
            WHERE locked_by IS NULL
            ORDER BY enqueued_at
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id, checkpoint_name, attempts)) = claimed else {
            tx.commit().await?;
            return Ok(None);
        };

        let attempts = attempts + 1;
        sqlx::query(
            "UPDATE finalize_tasks SET locked_by = $2, locked_at = now(), attempts = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(worker_id)
        .bind(attempts)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Some(FinalizeTask { id, checkpoint_name, attempts }))
    }

    /// Removes a successfully completed task.
    pub async fn ack(pool: &PgPool, task_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM finalize_tasks WHERE id = $1").bind(task_id).execute(pool).await?;
        Ok(())
    }

    /// Unlocks a task for re-claim without waiting for staleness, used when
    /// a worker observes a state that means the task is moot (e.g. already
    /// terminal) and wants to drop it without a full ack semantics change.
    pub async fn release(pool: &PgPool, task_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE finalize_tasks SET locked_by = NULL, locked_at = NULL WHERE id = $1")
            .bind(task_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Reconciler safety net (§4.11): unlocks every task whose lock is older
    /// than `stale_after`, so a crashed worker's claim doesn't strand it
    /// forever. Returns the count released.
    pub async fn release_stale(pool: &PgPool, stale_after: Duration) -> Result<u64, StoreError> {
        let cutoff = chrono::Utc::now() - stale_after;
        let result = sqlx::query(
            "UPDATE finalize_tasks SET locked_by = NULL, locked_at = NULL WHERE locked_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
