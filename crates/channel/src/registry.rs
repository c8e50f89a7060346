// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-replica connection registry (C6, §3.3/§4.6): the in-memory map from
//! `runner_id` to its live WebSocket connection, scoped to the replica that
//! accepted it. Also implements [`RunnerExecutor`] so `e2epool-backends`
//! can run `exec`/`ready_probe` without knowing anything about WebSockets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use e2epool_backends::{BackendError, ExecResult, RunnerExecutor};
use e2epool_wire::{ExecPayload, ExecResultPayload, Request, RequestKind};
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};

use crate::error::ChannelError;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A request queued to a connection's write side, paired with a channel the
/// connection task uses to deliver the matching response back.
pub struct PendingSend {
    pub request: Request,
    pub respond_to: oneshot::Sender<e2epool_wire::Response>,
}

#[derive(Clone)]
struct ConnectionHandle {
    outbound_tx: mpsc::Sender<PendingSend>,
}

/// Shared, cloneable handle — one instance per controller replica process.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<String, ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted connection. Per §4.6, a prior connection
    /// for the same runner is superseded (its handle is simply dropped,
    /// which closes its `outbound_tx`, so anything still reading it gets a
    /// clean shutdown signal).
    pub fn register(&self, runner_id: &str, outbound_tx: mpsc::Sender<PendingSend>) {
        self.connections.write().insert(runner_id.to_string(), ConnectionHandle { outbound_tx });
    }

    pub fn unregister(&self, runner_id: &str) {
        self.connections.write().remove(runner_id);
    }

    pub fn is_registered(&self, runner_id: &str) -> bool {
        self.connections.read().contains_key(runner_id)
    }

    /// Sends `request` to `runner_id`'s connection and awaits the matching
    /// response, bounded by `timeout`.
    pub async fn request(
        &self,
        runner_id: &str,
        request: Request,
        timeout: Duration,
    ) -> Result<e2epool_wire::Response, ChannelError> {
        let handle = self
            .connections
            .read()
            .get(runner_id)
            .cloned()
            .ok_or_else(|| ChannelError::NotConnected(runner_id.to_string()))?;

        let (respond_to, response_rx) = oneshot::channel();
        handle
            .outbound_tx
            .send(PendingSend { request, respond_to })
            .await
            .map_err(|_| ChannelError::NotConnected(runner_id.to_string()))?;

        tokio::time::timeout(timeout, response_rx)
            .await
            .map_err(|_| ChannelError::Timeout)?
            .map_err(|_| ChannelError::Closed)
    }
}

#[async_trait]
impl RunnerExecutor for ConnectionRegistry {
    async fn exec(
        &self,
        runner_id: &str,
        cmd: &str,
        timeout: Duration,
    ) -> Result<ExecResult, BackendError> {
        let request = Request::new(
            RequestKind::Exec,
            &ExecPayload { cmd: cmd.to_string(), timeout_secs: timeout.as_secs() },
        )
        .map_err(|e| BackendError::Channel(e.to_string()))?;
        let response = self
            .request(runner_id, request, timeout + Duration::from_secs(5))
            .await
            .map_err(|e| BackendError::Channel(e.to_string()))?;
        if !response.is_ok() {
            return Err(BackendError::ExecFailed(
                response.error.map(|e| e.detail).unwrap_or_else(|| "exec failed".to_string()),
            ));
        }
        let payload: ExecResultPayload = response
            .data_as()
            .map_err(|e| BackendError::Channel(e.to_string()))?;
        Ok(ExecResult { exit_code: payload.exit_code, stdout: payload.stdout, stderr: payload.stderr })
    }

    async fn is_connected(&self, runner_id: &str) -> bool {
        self.is_registered(runner_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_unregister_clears_entry() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        registry.register("r1", tx);
        assert!(registry.is_registered("r1"));
        registry.unregister("r1");
        assert!(!registry.is_registered("r1"));
    }

    #[tokio::test]
    async fn request_to_unregistered_runner_is_not_connected() {
        let registry = ConnectionRegistry::new();
        let request = Request::new(RequestKind::Ping, &e2epool_wire::EmptyPayload {}).unwrap();
        let result = registry.request("ghost", request, DEFAULT_REQUEST_TIMEOUT).await;
        assert!(matches!(result, Err(ChannelError::NotConnected(_))));
    }
}
