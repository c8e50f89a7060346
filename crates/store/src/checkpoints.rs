// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint repository (C1). Every state-mutating method takes a
//! transaction already holding the caller's advisory lock — see
//! [`crate::lock::acquire`] — and uses `SELECT ... FOR UPDATE` so the row
//! lock and the advisory lock agree on what "under the runner's lock" means.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use e2epool_core::{Checkpoint, CheckpointState, FinalizeSource, FinalizeStatus};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::error::StoreError;

#[derive(Debug, FromRow)]
struct CheckpointRow {
    name: String,
    runner_id: String,
    job_id: String,
    state: String,
    finalize_status: Option<String>,
    finalize_source: Option<String>,
    created_at: DateTime<Utc>,
    finalized_at: Option<DateTime<Utc>>,
}

impl CheckpointRow {
    fn into_domain(self) -> Result<Checkpoint, StoreError> {
        Ok(Checkpoint {
            name: self.name,
            runner_id: self.runner_id,
            job_id: self.job_id,
            state: CheckpointState::from_str(&self.state)?,
            finalize_status: self
                .finalize_status
                .as_deref()
                .map(FinalizeStatus::from_str)
                .transpose()?,
            finalize_source: self
                .finalize_source
                .as_deref()
                .map(FinalizeSource::from_str)
                .transpose()?,
            created_at: self.created_at,
            finalized_at: self.finalized_at,
        })
    }
}

pub struct CheckpointRepository;

impl CheckpointRepository {
    /// Inserts a newly created checkpoint. Relies on the partial unique
    /// index to enforce the single-active invariant as a backstop; the
    /// checkpoint service is expected to have already checked under the
    /// runner lock (§4.7 step 3).
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
        runner_id: &str,
        job_id: &str,
    ) -> Result<Checkpoint, StoreError> {
        let row: CheckpointRow = sqlx::query_as(
            r#"
            INSERT INTO checkpoints (name, runner_id, job_id, state, created_at)
            VALUES ($1, $2, $3, 'created', now())
            RETURNING name, runner_id, job_id, state, finalize_status, finalize_source,
                      created_at, finalized_at
            "#,
        )
        .bind(name)
        .bind(runner_id)
        .bind(job_id)
        .fetch_one(&mut **tx)
        .await?;
        row.into_domain()
    }

    /// `SELECT ... FOR UPDATE` on the runner's single active row, if any.
    pub async fn active_for_runner(
        tx: &mut Transaction<'_, Postgres>,
        runner_id: &str,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let row: Option<CheckpointRow> = sqlx::query_as(
            r#"
            SELECT name, runner_id, job_id, state, finalize_status, finalize_source,
                   created_at, finalized_at
            FROM checkpoints
            WHERE runner_id = $1 AND state IN ('created', 'finalize_queued')
            FOR UPDATE
            "#,
        )
        .bind(runner_id)
        .fetch_optional(&mut **tx)
        .await?;
        row.map(CheckpointRow::into_domain).transpose()
    }

    /// `SELECT ... FOR UPDATE` by name, used by `queue_finalize` and the
    /// finalize worker before mutating state.
    pub async fn for_update_by_name(
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let row: Option<CheckpointRow> = sqlx::query_as(
            r#"
            SELECT name, runner_id, job_id, state, finalize_status, finalize_source,
                   created_at, finalized_at
            FROM checkpoints
            WHERE name = $1
            FOR UPDATE
            "#,
        )
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;
        row.map(CheckpointRow::into_domain).transpose()
    }

    /// Read-only lookup, no lock — used by `get_status` (§4.7).
    pub async fn by_name(pool: &PgPool, name: &str) -> Result<Option<Checkpoint>, StoreError> {
        let row: Option<CheckpointRow> = sqlx::query_as(
            r#"
            SELECT name, runner_id, job_id, state, finalize_status, finalize_source,
                   created_at, finalized_at
            FROM checkpoints
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(pool)
        .await?;
        row.map(CheckpointRow::into_domain).transpose()
    }

    /// Most recent `finalized_at` for a runner, used by the cooldown check
    /// (§4.7 step 4).
    pub async fn most_recent_finalized_at(
        tx: &mut Transaction<'_, Postgres>,
        runner_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
            r#"
            SELECT finalized_at FROM checkpoints
            WHERE runner_id = $1 AND finalized_at IS NOT NULL
            ORDER BY finalized_at DESC
            LIMIT 1
            "#,
        )
        .bind(runner_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.and_then(|(v,)| v))
    }

    /// `created -> finalize_queued`, recording the outcome and source.
    pub async fn mark_finalize_queued(
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
        status: FinalizeStatus,
        source: FinalizeSource,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE checkpoints
            SET state = 'finalize_queued', finalize_status = $2, finalize_source = $3
            WHERE name = $1
            "#,
        )
        .bind(name)
        .bind(status.to_string())
        .bind(source.to_string())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Terminal transition (`finalize_queued -> reset|deleted`, or
    /// `created -> gc_reset`), committed only after side effects succeed.
    pub async fn mark_terminal(
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
        terminal: CheckpointState,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE checkpoints
            SET state = $2, finalized_at = now()
            WHERE name = $1
            "#,
        )
        .bind(name)
        .bind(terminal.to_string())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// GC scan target: `created` rows older than `older_than`, bounded by
    /// `limit` (§4.10's batch size).
    pub async fn created_older_than(
        pool: &PgPool,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Checkpoint>, StoreError> {
        let rows: Vec<CheckpointRow> = sqlx::query_as(
            r#"
            SELECT name, runner_id, job_id, state, finalize_status, finalize_source,
                   created_at, finalized_at
            FROM checkpoints
            WHERE state = 'created' AND created_at < $1
            ORDER BY created_at
            LIMIT $2
            "#,
        )
        .bind(older_than)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(CheckpointRow::into_domain).collect()
    }

    /// Poller scan target (§4.9b): `created` rows older than `min_age` but
    /// not yet terminal, bounded by `limit`.
    pub async fn created_older_than_min_age(
        pool: &PgPool,
        min_age_cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Checkpoint>, StoreError> {
        Self::created_older_than(pool, min_age_cutoff, limit).await
    }

    /// Looks up the active (`created` or `finalize_queued`) checkpoint for
    /// a job id, used by the webhook handler (§4.9c) to translate an
    /// inbound CI event — which carries a job id, not a checkpoint name —
    /// back to the row it should finalize.
    pub async fn active_by_job_id(
        pool: &PgPool,
        job_id: &str,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let row: Option<CheckpointRow> = sqlx::query_as(
            r#"
            SELECT name, runner_id, job_id, state, finalize_status, finalize_source,
                   created_at, finalized_at
            FROM checkpoints
            WHERE job_id = $1 AND state IN ('created', 'finalize_queued')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(job_id)
        .fetch_optional(pool)
        .await?;
        row.map(CheckpointRow::into_domain).transpose()
    }

    /// Reconciler scan target (§4.11): rows stuck in `finalize_queued`.
    pub async fn finalize_queued(pool: &PgPool, limit: i64) -> Result<Vec<Checkpoint>, StoreError> {
        let rows: Vec<CheckpointRow> = sqlx::query_as(
            r#"
            SELECT name, runner_id, job_id, state, finalize_status, finalize_source,
                   created_at, finalized_at
            FROM checkpoints
            WHERE state = 'finalize_queued'
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(CheckpointRow::into_domain).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_row_rejects_unknown_state_string() {
        let row = CheckpointRow {
            name: "job-1-1-aaaaaaaa".to_string(),
            runner_id: "r1".to_string(),
            job_id: "1".to_string(),
            state: "bogus".to_string(),
            finalize_status: None,
            finalize_source: None,
            created_at: Utc::now(),
            finalized_at: None,
        };
        assert!(row.into_domain().is_err());
    }
}
