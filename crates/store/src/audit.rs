// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit log repository (C1, backing §3.1's `operation_logs`).
//! Named distinctly from `e2epool_core::operation_log`, which defines the
//! row's domain type, to keep "the type" and "the repository" unambiguous
//! within this crate.

use chrono::{DateTime, Utc};
use e2epool_core::{BackendKind, OperationLogEntry, OperationResult};
use sqlx::PgPool;

use crate::error::StoreError;

pub struct AuditLog;

impl AuditLog {
    pub async fn insert(pool: &PgPool, entry: &OperationLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO operation_logs
                (checkpoint_name, runner_id, operation, backend, detail, result,
                 started_at, finished_at, duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&entry.checkpoint_name)
        .bind(&entry.runner_id)
        .bind(&entry.operation)
        .bind(entry.backend.map(|b| b.to_string()))
        .bind(&entry.detail)
        .bind(entry.result.to_string())
        .bind(entry.started_at)
        .bind(entry.finished_at)
        .bind(entry.duration_ms())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Recent entries for a checkpoint, newest first, used by the status
    /// endpoint and admin tooling.
    pub async fn for_checkpoint(
        pool: &PgPool,
        checkpoint_name: &str,
        limit: i64,
    ) -> Result<Vec<OperationLogEntry>, StoreError> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT checkpoint_name, runner_id, operation, backend, detail, result,
                   started_at, finished_at
            FROM operation_logs
            WHERE checkpoint_name = $1
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(checkpoint_name)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(AuditRow::into_domain).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    checkpoint_name: String,
    runner_id: String,
    operation: String,
    backend: Option<String>,
    detail: String,
    result: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_domain(self) -> Result<OperationLogEntry, StoreError> {
        use std::str::FromStr;
        Ok(OperationLogEntry {
            checkpoint_name: self.checkpoint_name,
            runner_id: self.runner_id,
            operation: self.operation,
            backend: self.backend.as_deref().map(BackendKind::from_str).transpose()?,
            detail: self.detail,
            result: match self.result.as_str() {
                "ok" => OperationResult::Ok,
                "error" => OperationResult::Error,
                other => return Err(StoreError::CorruptAuditRow(other.to_string())),
            },
            started_at: self.started_at,
            finished_at: self.finished_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_row_rejects_unknown_backend_string() {
        let row = AuditRow {
            checkpoint_name: "job-demo-1000-aaaaaaaa".to_string(),
            runner_id: "r1".to_string(),
            operation: "reset".to_string(),
            backend: Some("bogus".to_string()),
            detail: String::new(),
            result: "ok".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        assert!(row.into_domain().is_err());
    }
}
