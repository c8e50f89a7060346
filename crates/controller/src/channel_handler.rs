// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires [`e2epool_channel::ChannelHandler`] and
//! [`e2epool_channel::RunnerAuthenticator`] to the checkpoint service and
//! runner registry, so the agent channel crate stays decoupled from the
//! controller's domain logic (§4.6's dependency-inversion seam).

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use e2epool_channel::{ChannelHandler, RunnerAuthenticator};
use e2epool_core::{FinalizeSource, FinalizeStatus, Runner};
use e2epool_store::SharedRunnerRegistry;
use e2epool_wire::{CreatePayload, FinalizePayload, StatusPayload};

use crate::checkpoint_service::CheckpointService;

pub struct ControllerRunnerAuthenticator {
    registry: SharedRunnerRegistry,
}

impl ControllerRunnerAuthenticator {
    pub fn new(registry: SharedRunnerRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RunnerAuthenticator for ControllerRunnerAuthenticator {
    async fn authenticate(&self, runner_id: &str, token: &str) -> Option<Runner> {
        let runner = self.registry.by_runner_id(runner_id).await.ok().flatten()?;
        if runner.token == token {
            Some(runner)
        } else {
            None
        }
    }
}

pub struct ControllerChannelHandler {
    checkpoints: Arc<CheckpointService>,
    registry: SharedRunnerRegistry,
}

impl ControllerChannelHandler {
    pub fn new(checkpoints: Arc<CheckpointService>, registry: SharedRunnerRegistry) -> Self {
        Self { checkpoints, registry }
    }

    /// The WS connection already authenticated `runner_id` at connect time;
    /// re-reading the registry row here just gives us the current token to
    /// hand to the checkpoint service's own ownership check, so a token
    /// rotated mid-connection is still caught.
    async fn caller_token(&self, runner_id: &str) -> Result<String, (u16, String)> {
        self.registry
            .by_runner_id(runner_id)
            .await
            .map_err(|e| crate::error::ServiceError::from(e).as_code_detail())?
            .map(|r| r.token)
            .ok_or((404, "not found".to_string()))
    }
}

#[async_trait]
impl ChannelHandler for ControllerChannelHandler {
    async fn create(
        &self,
        runner_id: &str,
        payload: CreatePayload,
    ) -> Result<serde_json::Value, (u16, String)> {
        let token = self.caller_token(runner_id).await?;
        let checkpoint = self
            .checkpoints
            .create(runner_id, &payload.job_id, &token)
            .await
            .map_err(|e| e.as_code_detail())?;
        serde_json::to_value(checkpoint)
            .map_err(|e| (500, format!("failed to encode checkpoint: {e}")))
    }

    async fn finalize(
        &self,
        runner_id: &str,
        payload: FinalizePayload,
    ) -> Result<serde_json::Value, (u16, String)> {
        let status = FinalizeStatus::from_str(&payload.status)
            .map_err(|e| (400, e.to_string()))?;
        let source = FinalizeSource::from_str(&payload.source).unwrap_or(FinalizeSource::Agent);
        let outcome = self
            .checkpoints
            .queue_finalize(runner_id, &payload.checkpoint_name, status, source)
            .await
            .map_err(|e| e.as_code_detail())?;
        Ok(serde_json::json!({ "detail": outcome.detail() }))
    }

    async fn status(
        &self,
        runner_id: &str,
        payload: StatusPayload,
    ) -> Result<serde_json::Value, (u16, String)> {
        let token = self.caller_token(runner_id).await?;
        let checkpoint = self
            .checkpoints
            .get_status(&payload.checkpoint_name, &token)
            .await
            .map_err(|e| e.as_code_detail())?;
        serde_json::to_value(checkpoint)
            .map_err(|e| (500, format!("failed to encode checkpoint: {e}")))
    }
}
