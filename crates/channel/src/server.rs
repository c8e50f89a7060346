// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller-side WebSocket endpoint (§4.6): accepts agent connections,
//! authenticates them against the runner registry, and multiplexes the
//! `create`/`finalize`/`status`/`ping` requests the runner sends against a
//! [`ChannelHandler`] the controller provides.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use e2epool_core::Runner;
use e2epool_wire::{
    CreatePayload, FinalizePayload, Request, RequestKind, Response, StatusPayload,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::registry::{ConnectionRegistry, PendingSend};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(90);
const AUTH_FAILURE_CLOSE_CODE: u16 = 4401;

/// Result of looking up and validating against the runner registry. The
/// controller supplies the implementation; `e2epool-store`'s
/// `RunnerRegistry` is the expected backer.
#[async_trait]
pub trait RunnerAuthenticator: Send + Sync {
    async fn authenticate(&self, runner_id: &str, token: &str) -> Option<Runner>;
}

/// Dispatches a runner-initiated request to the checkpoint service. The
/// controller binary supplies the implementation.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    async fn create(
        &self,
        runner_id: &str,
        payload: CreatePayload,
    ) -> Result<serde_json::Value, (u16, String)>;

    async fn finalize(
        &self,
        runner_id: &str,
        payload: FinalizePayload,
    ) -> Result<serde_json::Value, (u16, String)>;

    async fn status(
        &self,
        runner_id: &str,
        payload: StatusPayload,
    ) -> Result<serde_json::Value, (u16, String)>;
}

#[derive(Clone)]
pub struct ChannelState {
    pub registry: ConnectionRegistry,
    pub handler: Arc<dyn ChannelHandler>,
    pub authenticator: Arc<dyn RunnerAuthenticator>,
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    runner_id: String,
    token: String,
}

pub fn router(state: ChannelState) -> Router {
    Router::new().route("/ws/agent", get(ws_handler)).with_state(state)
}

async fn ws_handler(
    State(state): State<ChannelState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        match state.authenticator.authenticate(&params.runner_id, &params.token).await {
            Some(_runner) => handle_socket(socket, params.runner_id, state).await,
            None => {
                let _ = close_unauthenticated(socket).await;
            }
        }
    })
}

async fn close_unauthenticated(mut socket: WebSocket) -> Result<(), axum::Error> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code: AUTH_FAILURE_CLOSE_CODE,
            reason: "invalid runner_id or token".into(),
        })))
        .await
}

async fn handle_socket(socket: WebSocket, runner_id: String, state: ChannelState) {
    let (mut sink, mut stream) = socket.split();
    let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = write_rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<PendingSend>(32);
    state.registry.register(&runner_id, outbound_tx);

    let pending: Arc<Mutex<HashMap<Uuid, oneshot::Sender<Response>>>> =
        Arc::new(Mutex::new(HashMap::new()));
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // first tick fires immediately; consume it
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if last_pong.elapsed() > HEARTBEAT_TIMEOUT {
                    tracing::warn!(%runner_id, "agent channel: heartbeat timeout, closing");
                    break;
                }
                if write_tx.send(Message::Ping(Vec::new())).is_err() {
                    break;
                }
            }
            maybe_send = outbound_rx.recv() => {
                let Some(pending_send) = maybe_send else { break };
                pending.lock().insert(pending_send.request.id, pending_send.respond_to);
                match serde_json::to_string(&pending_send.request) {
                    Ok(text) => { let _ = write_tx.send(Message::Text(text)); }
                    Err(e) => tracing::warn!(%runner_id, %e, "agent channel: failed to encode outbound request"),
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => { last_pong = Instant::now(); }
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound_text(&text, &runner_id, &state, &pending, &write_tx).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!(%runner_id, %e, "agent channel: read error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    state.registry.unregister(&runner_id);
    writer.abort();
}

async fn handle_inbound_text(
    text: &str,
    runner_id: &str,
    state: &ChannelState,
    pending: &Arc<Mutex<HashMap<Uuid, oneshot::Sender<Response>>>>,
    write_tx: &mpsc::UnboundedSender<Message>,
) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        tracing::warn!(%runner_id, "agent channel: received non-JSON frame");
        return;
    };

    if value.get("type").is_some() {
        let request: Request = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%runner_id, %e, "agent channel: malformed request envelope");
                return;
            }
        };
        let response = dispatch_request(runner_id, &request, state).await;
        if let Ok(text) = serde_json::to_string(&response) {
            let _ = write_tx.send(Message::Text(text));
        }
        return;
    }

    if value.get("status").is_some() {
        let Ok(response) = serde_json::from_value::<Response>(value) else {
            tracing::warn!(%runner_id, "agent channel: malformed response envelope");
            return;
        };
        if let Some(respond_to) = pending.lock().remove(&response.id) {
            let _ = respond_to.send(response);
        }
        return;
    }

    tracing::warn!(%runner_id, "agent channel: frame matched neither request nor response shape");
}

async fn dispatch_request(runner_id: &str, request: &Request, state: &ChannelState) -> Response {
    let result = match request.kind {
        RequestKind::Create => {
            let payload: CreatePayload = match request.payload_as() {
                Ok(p) => p,
                Err(e) => return Response::error(request.id, 400, e.to_string()),
            };
            state.handler.create(runner_id, payload).await
        }
        RequestKind::Finalize => {
            let payload: FinalizePayload = match request.payload_as() {
                Ok(p) => p,
                Err(e) => return Response::error(request.id, 400, e.to_string()),
            };
            state.handler.finalize(runner_id, payload).await
        }
        RequestKind::Status => {
            let payload: StatusPayload = match request.payload_as() {
                Ok(p) => p,
                Err(e) => return Response::error(request.id, 400, e.to_string()),
            };
            state.handler.status(runner_id, payload).await
        }
        RequestKind::Ping => {
            Ok(serde_json::to_value(e2epool_wire::PongPayload::default()).unwrap_or_default())
        }
        RequestKind::Exec | RequestKind::ReadyProbe => {
            Err((400, format!("{} is controller-initiated, not runner-initiated", request.kind)))
        }
    };

    match result {
        Ok(data) => Response::ok(request.id, &data).unwrap_or_else(|e| {
            Response::error(request.id, 500, format!("failed to encode response: {e}"))
        }),
        Err((code, detail)) => Response::error(request.id, code, detail),
    }
}
