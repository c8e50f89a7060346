// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner registry repository (C1, backing C3).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use e2epool_core::{BackendKind, HypervisorFields, Runner};
use sqlx::{FromRow, PgPool};

use crate::error::StoreError;

#[derive(Debug, FromRow)]
struct RunnerRow {
    runner_id: String,
    token: String,
    backend: String,
    ci_adapter: String,
    hypervisor_host: Option<String>,
    hypervisor_token_name: Option<String>,
    hypervisor_token_secret: Option<String>,
    hypervisor_node: Option<String>,
    hypervisor_vmid: Option<String>,
    reset_cmd: Option<String>,
    cleanup_cmd: Option<String>,
    readiness_cmd: Option<String>,
    ci_base_url: String,
    ci_token: String,
    ci_runner_id: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RunnerRow {
    fn into_domain(self) -> Result<Runner, StoreError> {
        Ok(Runner {
            runner_id: self.runner_id,
            token: self.token,
            backend: BackendKind::from_str(&self.backend)?,
            ci_adapter: self.ci_adapter,
            hypervisor: HypervisorFields {
                host: self.hypervisor_host,
                token_name: self.hypervisor_token_name,
                token_secret: self.hypervisor_token_secret,
                node: self.hypervisor_node,
                vmid: self.hypervisor_vmid,
            },
            reset_cmd: self.reset_cmd,
            cleanup_cmd: self.cleanup_cmd,
            readiness_cmd: self.readiness_cmd,
            ci_base_url: self.ci_base_url,
            ci_token: self.ci_token,
            ci_runner_id: self.ci_runner_id,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    runner_id, token, backend, ci_adapter,
    hypervisor_host, hypervisor_token_name, hypervisor_token_secret, hypervisor_node, hypervisor_vmid,
    reset_cmd, cleanup_cmd, readiness_cmd,
    ci_base_url, ci_token, ci_runner_id,
    is_active, created_at, updated_at
"#;

pub struct RunnerRepository;

impl RunnerRepository {
    /// Inserts a new active runner row. The caller is responsible for
    /// generating `runner.token` (high entropy, per §3.1) before calling.
    pub async fn insert(pool: &PgPool, runner: &Runner) -> Result<Runner, StoreError> {
        let query = format!(
            "INSERT INTO runners ({cols}) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,now(),now()) RETURNING {cols}",
            cols = SELECT_COLUMNS,
        );
        let row: RunnerRow = sqlx::query_as(&query)
            .bind(&runner.runner_id)
            .bind(&runner.token)
            .bind(runner.backend.to_string())
            .bind(&runner.ci_adapter)
            .bind(&runner.hypervisor.host)
            .bind(&runner.hypervisor.token_name)
            .bind(&runner.hypervisor.token_secret)
            .bind(&runner.hypervisor.node)
            .bind(&runner.hypervisor.vmid)
            .bind(&runner.reset_cmd)
            .bind(&runner.cleanup_cmd)
            .bind(&runner.readiness_cmd)
            .bind(&runner.ci_base_url)
            .bind(&runner.ci_token)
            .bind(&runner.ci_runner_id)
            .bind(runner.is_active)
            .fetch_one(pool)
            .await?;
        row.into_domain()
    }

    pub async fn by_runner_id(pool: &PgPool, runner_id: &str) -> Result<Option<Runner>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM runners WHERE runner_id = $1 AND is_active = TRUE"
        );
        let row: Option<RunnerRow> = sqlx::query_as(&query).bind(runner_id).fetch_optional(pool).await?;
        row.map(RunnerRow::into_domain).transpose()
    }

    pub async fn by_token(pool: &PgPool, token: &str) -> Result<Option<Runner>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM runners WHERE token = $1 AND is_active = TRUE"
        );
        let row: Option<RunnerRow> = sqlx::query_as(&query).bind(token).fetch_optional(pool).await?;
        row.map(RunnerRow::into_domain).transpose()
    }

    pub async fn list(pool: &PgPool, include_inactive: bool) -> Result<Vec<Runner>, StoreError> {
        let query = if include_inactive {
            format!("SELECT {SELECT_COLUMNS} FROM runners ORDER BY runner_id")
        } else {
            format!("SELECT {SELECT_COLUMNS} FROM runners WHERE is_active = TRUE ORDER BY runner_id")
        };
        let rows: Vec<RunnerRow> = sqlx::query_as(&query).fetch_all(pool).await?;
        rows.into_iter().map(RunnerRow::into_domain).collect()
    }

    /// Soft-deletes by `runner_id` (§3.3: runner rows are owned by the admin
    /// API, never hard-deleted).
    pub async fn soft_delete(pool: &PgPool, runner_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE runners SET is_active = FALSE, updated_at = now() WHERE runner_id = $1",
        )
        .bind(runner_id)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RunnerNotFound);
        }
        Ok(())
    }

    /// Reactivating an inactive row rotates the token (§3.1 invariant).
    pub async fn reactivate_with_new_token(
        pool: &PgPool,
        runner_id: &str,
        new_token: &str,
    ) -> Result<Runner, StoreError> {
        let query = format!(
            "UPDATE runners SET is_active = TRUE, token = $2, updated_at = now() WHERE runner_id = $1 RETURNING {SELECT_COLUMNS}"
        );
        let row: RunnerRow = sqlx::query_as(&query)
            .bind(runner_id)
            .bind(new_token)
            .fetch_one(pool)
            .await?;
        row.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_row_rejects_unknown_backend_string() {
        let row = RunnerRow {
            runner_id: "r1".to_string(),
            token: "tok".to_string(),
            backend: "bogus".to_string(),
            ci_adapter: "gitlab".to_string(),
            hypervisor_host: None,
            hypervisor_token_name: None,
            hypervisor_token_secret: None,
            hypervisor_node: None,
            hypervisor_vmid: None,
            reset_cmd: Some("/opt/e2epool/reset.sh".to_string()),
            cleanup_cmd: None,
            readiness_cmd: None,
            ci_base_url: "https://gitlab.example.com".to_string(),
            ci_token: "glpat".to_string(),
            ci_runner_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(row.into_domain().is_err());
    }
}
