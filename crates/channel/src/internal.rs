// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-replica dispatch (§4.6): the internal HTTP hop a finalize worker on
//! one replica uses to run `exec` against a runner whose WebSocket is
//! attached to a different replica. Within a single replica the request
//! never leaves the process — [`MeshedExecutor`] checks the local
//! [`ConnectionRegistry`] before calling out to any peer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use e2epool_backends::{BackendError, ExecResult, RunnerExecutor};
use serde::{Deserialize, Serialize};

use crate::registry::ConnectionRegistry;

#[derive(Debug, Deserialize)]
pub struct InternalExecRequest {
    pub cmd: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InternalExecResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Router exposing `POST /internal/agent/{runner_id}/exec` for this
/// replica's locally held connections. Not exposed on the public listener;
/// the controller binary binds it on an internal-only address.
pub fn internal_router(registry: ConnectionRegistry) -> Router {
    Router::new()
        .route("/internal/agent/:runner_id/exec", post(exec_route))
        .route("/internal/agent/:runner_id/connected", get(connected_route))
        .with_state(registry)
}

#[derive(Debug, Serialize, Deserialize)]
struct ConnectedResponse {
    connected: bool,
}

async fn connected_route(
    State(registry): State<ConnectionRegistry>,
    Path(runner_id): Path<String>,
) -> impl IntoResponse {
    Json(ConnectedResponse { connected: registry.is_registered(&runner_id) })
}

async fn exec_route(
    State(registry): State<ConnectionRegistry>,
    Path(runner_id): Path<String>,
    Json(body): Json<InternalExecRequest>,
) -> impl IntoResponse {
    if !registry.is_registered(&runner_id) {
        return (StatusCode::NOT_FOUND, Json(None::<InternalExecResponse>));
    }

    match registry.exec(&runner_id, &body.cmd, Duration::from_secs(body.timeout_secs)).await {
        Ok(result) => (
            StatusCode::OK,
            Json(Some(InternalExecResponse {
                exit_code: result.exit_code,
                stdout: result.stdout,
                stderr: result.stderr,
            })),
        ),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, Json(None::<InternalExecResponse>)),
    }
}

/// A [`RunnerExecutor`] that checks this replica's connection registry
/// first, then falls back to meshing the internal endpoint of every listed
/// peer (§4.6: "all replicas mesh their internal endpoints"). With an empty
/// peer list this degrades to a sticky-load-balancer deployment, the
/// minimum viable topology for a single replica.
pub struct MeshedExecutor {
    local: ConnectionRegistry,
    client: reqwest::Client,
    peer_base_urls: Vec<String>,
}

impl MeshedExecutor {
    pub fn new(local: ConnectionRegistry, peer_base_urls: Vec<String>) -> Self {
        Self { local, client: reqwest::Client::new(), peer_base_urls }
    }
}

#[async_trait]
impl RunnerExecutor for MeshedExecutor {
    async fn exec(
        &self,
        runner_id: &str,
        cmd: &str,
        timeout: Duration,
    ) -> Result<ExecResult, BackendError> {
        if self.local.is_registered(runner_id) {
            return self.local.exec(runner_id, cmd, timeout).await;
        }

        for base_url in &self.peer_base_urls {
            let url = format!("{base_url}/internal/agent/{runner_id}/exec");
            let sent = self
                .client
                .post(&url)
                .json(&InternalExecRequest { cmd: cmd.to_string(), timeout_secs: timeout.as_secs() })
                .timeout(timeout + Duration::from_secs(5))
                .send()
                .await;

            match sent {
                Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => continue,
                Ok(resp) if resp.status().is_success() => {
                    let body: InternalExecResponse = resp
                        .json()
                        .await
                        .map_err(|e| BackendError::Channel(e.to_string()))?;
                    return Ok(ExecResult {
                        exit_code: body.exit_code,
                        stdout: body.stdout,
                        stderr: body.stderr,
                    });
                }
                Ok(resp) => {
                    return Err(BackendError::ExecFailed(format!(
                        "peer {base_url} returned {}",
                        resp.status()
                    )))
                }
                Err(_) => continue,
            }
        }

        Err(BackendError::Channel(format!(
            "runner {runner_id:?} is not connected to this replica or any meshed peer"
        )))
    }

    async fn is_connected(&self, runner_id: &str) -> bool {
        if self.local.is_connected(runner_id).await {
            return true;
        }

        for base_url in &self.peer_base_urls {
            let url = format!("{base_url}/internal/agent/{runner_id}/connected");
            let Ok(resp) = self.client.get(&url).send().await else { continue };
            if let Ok(body) = resp.json::<ConnectedResponse>().await {
                if body.connected {
                    return true;
                }
            }
        }
        false
    }
}
