// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The public HTTP API (§6.1): checkpoint lifecycle for runners, admin CRUD
//! over the runner registry, and `/healthz`. The agent WebSocket endpoint
//! and the internal cross-replica mesh are mounted separately (`main.rs`)
//! since they bind a different address in production.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use e2epool_core::{Checkpoint, FinalizeSource, FinalizeStatus};
use e2epool_store::{RunnerRepository, SharedRunnerRegistry};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::auth::{require_admin, require_runner};
use crate::checkpoint_service::CheckpointService;
use crate::error::ServiceError;

#[derive(Clone)]
pub struct AppState {
    pub checkpoints: Arc<CheckpointService>,
    pub runner_registry: SharedRunnerRegistry,
    pub pool: sqlx::PgPool,
    pub admin_token: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/checkpoint/create", post(create_checkpoint))
        .route("/checkpoint/finalize", post(finalize_checkpoint))
        .route("/checkpoint/status/:name", get(checkpoint_status))
        .route("/runner/readiness", get(runner_readiness))
        .route("/api/runners", post(register_runner).get(list_runners))
        .route("/api/runners/:runner_id", get(get_runner).delete(delete_runner))
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "unavailable" })),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct CreateCheckpointRequest {
    runner_id: String,
    job_id: String,
}

#[derive(Debug, Serialize)]
struct CheckpointResponse {
    name: String,
    runner_id: String,
    job_id: String,
    state: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Checkpoint> for CheckpointResponse {
    fn from(c: Checkpoint) -> Self {
        Self {
            name: c.name,
            runner_id: c.runner_id,
            job_id: c.job_id,
            state: c.state.to_string(),
            created_at: c.created_at,
        }
    }
}

async fn create_checkpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateCheckpointRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let caller = require_runner(&headers, &state.runner_registry).await?;
    if caller.runner_id != body.runner_id {
        return Err(ServiceError::Forbidden);
    }
    let checkpoint = state.checkpoints.create(&body.runner_id, &body.job_id, &caller.token).await?;
    Ok((StatusCode::CREATED, Json(CheckpointResponse::from(checkpoint))))
}

#[derive(Debug, Deserialize)]
struct FinalizeCheckpointRequest {
    checkpoint_name: String,
    status: String,
    #[serde(default = "default_finalize_source")]
    source: String,
}

fn default_finalize_source() -> String {
    "hook".to_string()
}

#[derive(Debug, Serialize)]
struct FinalizeResponse {
    detail: String,
    checkpoint_name: String,
}

async fn finalize_checkpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<FinalizeCheckpointRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let caller = require_runner(&headers, &state.runner_registry).await?;
    let status = FinalizeStatus::from_str(&body.status)
        .map_err(|e| ServiceError::Validation(e.to_string()))?;
    let source = FinalizeSource::from_str(&body.source)
        .map_err(|e| ServiceError::Validation(e.to_string()))?;
    let outcome = state
        .checkpoints
        .queue_finalize(&caller.runner_id, &body.checkpoint_name, status, source)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(FinalizeResponse {
            detail: outcome.detail().to_string(),
            checkpoint_name: body.checkpoint_name,
        }),
    ))
}

async fn checkpoint_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let caller = require_runner(&headers, &state.runner_registry).await?;
    let checkpoint = state.checkpoints.get_status(&name, &caller.token).await?;
    Ok(Json(checkpoint))
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    ready: bool,
}

async fn runner_readiness(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let caller = require_runner(&headers, &state.runner_registry).await?;
    let ready = state.checkpoints.is_ready(&caller.runner_id).await;
    Ok(Json(ReadinessResponse { ready }))
}

#[derive(Debug, Deserialize)]
struct RegisterRunnerRequest {
    runner_id: String,
    backend: String,
    ci_adapter: String,
    #[serde(default)]
    hypervisor_host: Option<String>,
    #[serde(default)]
    hypervisor_token_name: Option<String>,
    #[serde(default)]
    hypervisor_token_secret: Option<String>,
    #[serde(default)]
    hypervisor_node: Option<String>,
    #[serde(default)]
    hypervisor_vmid: Option<String>,
    #[serde(default)]
    reset_cmd: Option<String>,
    #[serde(default)]
    cleanup_cmd: Option<String>,
    #[serde(default)]
    readiness_cmd: Option<String>,
    ci_base_url: String,
    ci_token: String,
    #[serde(default)]
    ci_runner_id: Option<String>,
}

async fn register_runner(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterRunnerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    require_admin(&headers, &state.admin_token)?;

    let backend = e2epool_core::BackendKind::from_str(&body.backend)
        .map_err(|e| ServiceError::Validation(e.to_string()))?;
    let now = chrono::Utc::now();
    let runner = e2epool_core::Runner {
        runner_id: body.runner_id,
        token: format!("tok-{}", nanoid::nanoid!(32)),
        backend,
        ci_adapter: body.ci_adapter,
        hypervisor: e2epool_core::HypervisorFields {
            host: body.hypervisor_host,
            token_name: body.hypervisor_token_name,
            token_secret: body.hypervisor_token_secret,
            node: body.hypervisor_node,
            vmid: body.hypervisor_vmid,
        },
        reset_cmd: body.reset_cmd,
        cleanup_cmd: body.cleanup_cmd,
        readiness_cmd: body.readiness_cmd,
        ci_base_url: body.ci_base_url,
        ci_token: body.ci_token,
        ci_runner_id: body.ci_runner_id,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    runner.validate().map_err(|e| ServiceError::Validation(e.to_string()))?;

    let inserted = RunnerRepository::insert(&state.pool, &runner).await?;
    Ok((StatusCode::CREATED, Json(inserted)))
}

#[derive(Debug, Deserialize)]
struct ListRunnersQuery {
    #[serde(default)]
    include_inactive: bool,
}

async fn list_runners(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListRunnersQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    require_admin(&headers, &state.admin_token)?;
    let runners = RunnerRepository::list(&state.pool, query.include_inactive).await?;
    Ok(Json(runners.into_iter().map(mask_secrets).collect::<Vec<_>>()))
}

async fn get_runner(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(runner_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    require_admin(&headers, &state.admin_token)?;
    let runner = RunnerRepository::by_runner_id(&state.pool, &runner_id)
        .await?
        .ok_or(ServiceError::NotFound)?;
    Ok(Json(mask_secrets(runner)))
}

async fn delete_runner(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(runner_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    require_admin(&headers, &state.admin_token)?;
    let runner = RunnerRepository::by_runner_id(&state.pool, &runner_id)
        .await?
        .ok_or(ServiceError::NotFound)?;
    RunnerRepository::soft_delete(&state.pool, &runner_id).await?;
    state.runner_registry.invalidate(&runner_id, &runner.token);
    Ok(StatusCode::NO_CONTENT)
}

/// Masks token and hypervisor secret before returning a runner row over the
/// admin API (§6.1's "token and backend secret masked").
fn mask_secrets(mut runner: e2epool_core::Runner) -> e2epool_core::Runner {
    runner.token = "***".to_string();
    runner.hypervisor.token_secret = runner.hypervisor.token_secret.as_ref().map(|_| "***".to_string());
    runner.ci_token = "***".to_string();
    runner
}
