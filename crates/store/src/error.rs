// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("checkpoint not found")]
    CheckpointNotFound,
    #[error("runner not found")]
    RunnerNotFound,
    #[error("single-active invariant violated for runner {0:?}")]
    ActiveCheckpointExists(String),
    #[error("stored row contains invalid data: {0}")]
    CorruptRow(#[from] e2epool_core::CheckpointError),
    #[error("stored row contains invalid runner data: {0}")]
    CorruptRunnerRow(#[from] e2epool_core::RunnerError),
    #[error("stored audit row contains invalid data: {0:?}")]
    CorruptAuditRow(String),
    #[error("E2EPOOL_DATABASE_URL must be set")]
    MissingDatabaseUrl,
}
