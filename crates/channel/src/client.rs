// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-side channel client (§4.6): a persistent, reconnecting WebSocket
//! connection the agent uses to send `create`/`finalize`/`status`/`ping`
//! requests to the controller, and through which the controller drives
//! `exec`/`ready_probe` against this host.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use e2epool_wire::{
    CreatePayload, EmptyPayload, ExecPayload, ExecResultPayload, FinalizePayload, ReadyPayload,
    Request, RequestKind, Response, StatusPayload,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::backoff::delay_for_attempt;
use crate::error::ChannelError;
use crate::registry::PendingSend;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(90);

/// Executes the two controller-initiated request types. Implemented by the
/// agent binary (shelling out via `tokio::process::Command`).
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn exec(&self, cmd: &str, timeout: Duration) -> ExecResultPayload;
    async fn ready(&self) -> bool;
}

/// Handle to the background connection task. Cloneable; every clone shares
/// the same underlying connection and reconnect loop.
#[derive(Clone)]
pub struct AgentChannelClient {
    outbound_tx: mpsc::Sender<PendingSend>,
}

impl AgentChannelClient {
    /// Spawns the background connection-maintenance task and returns a
    /// handle immediately; the first connection attempt happens
    /// asynchronously.
    pub fn spawn(
        url: String,
        runner_id: String,
        token: String,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(32);
        tokio::spawn(connection_loop(url, runner_id, token, executor, outbound_rx));
        Self { outbound_tx }
    }

    async fn request(&self, request: Request, timeout: Duration) -> Result<Response, ChannelError> {
        let (respond_to, response_rx) = oneshot::channel();
        self.outbound_tx
            .send(PendingSend { request, respond_to })
            .await
            .map_err(|_| ChannelError::Closed)?;
        tokio::time::timeout(timeout, response_rx)
            .await
            .map_err(|_| ChannelError::Timeout)?
            .map_err(|_| ChannelError::Closed)
    }

    pub async fn create(&self, job_id: &str) -> Result<serde_json::Value, ChannelError> {
        let request = Request::new(RequestKind::Create, &CreatePayload { job_id: job_id.to_string() })?;
        ok_data(self.request(request, DEFAULT_REQUEST_TIMEOUT).await?)
    }

    pub async fn finalize(
        &self,
        checkpoint_name: &str,
        status: &str,
    ) -> Result<serde_json::Value, ChannelError> {
        let request = Request::new(
            RequestKind::Finalize,
            &FinalizePayload {
                checkpoint_name: checkpoint_name.to_string(),
                status: status.to_string(),
                source: "agent".to_string(),
            },
        )?;
        ok_data(self.request(request, DEFAULT_REQUEST_TIMEOUT).await?)
    }

    pub async fn status(&self, checkpoint_name: &str) -> Result<serde_json::Value, ChannelError> {
        let request = Request::new(
            RequestKind::Status,
            &StatusPayload { checkpoint_name: checkpoint_name.to_string() },
        )?;
        ok_data(self.request(request, DEFAULT_REQUEST_TIMEOUT).await?)
    }

    pub async fn ping(&self) -> Result<(), ChannelError> {
        let request = Request::new(RequestKind::Ping, &EmptyPayload {})?;
        ok_data(self.request(request, DEFAULT_REQUEST_TIMEOUT).await?).map(|_| ())
    }
}

fn ok_data(response: Response) -> Result<serde_json::Value, ChannelError> {
    if response.is_ok() {
        Ok(response.data.unwrap_or(serde_json::Value::Null))
    } else {
        let detail = response.error.map(|e| e.detail).unwrap_or_else(|| "request failed".to_string());
        Err(ChannelError::NotConnected(detail))
    }
}

async fn connection_loop(
    url: String,
    runner_id: String,
    token: String,
    executor: Arc<dyn CommandExecutor>,
    mut outbound_rx: mpsc::Receiver<PendingSend>,
) {
    let mut attempt = 0u32;
    loop {
        let connect_url = format!(
            "{url}?runner_id={}&token={}",
            urlencode(&runner_id),
            urlencode(&token)
        );

        match tokio_tungstenite::connect_async(&connect_url).await {
            Ok((stream, _response)) => {
                tracing::info!(%runner_id, "agent channel: connected");
                attempt = 0;
                run_connection(stream, &executor, &mut outbound_rx).await;
                tracing::warn!(%runner_id, "agent channel: connection lost, reconnecting");
            }
            Err(e) => {
                tracing::warn!(%runner_id, %e, "agent channel: connect failed");
            }
        }

        let delay = delay_for_attempt(attempt);
        attempt = attempt.saturating_add(1);
        tokio::time::sleep(delay).await;
    }
}

async fn run_connection(
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    executor: &Arc<dyn CommandExecutor>,
    outbound_rx: &mut mpsc::Receiver<PendingSend>,
) {
    let (mut sink, mut stream) = stream.split();
    let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = write_rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let pending: Arc<Mutex<HashMap<Uuid, oneshot::Sender<Response>>>> =
        Arc::new(Mutex::new(HashMap::new()));
    let mut last_ping = Instant::now();

    loop {
        tokio::select! {
            maybe_send = outbound_rx.recv() => {
                let Some(pending_send) = maybe_send else { break };
                pending.lock().insert(pending_send.request.id, pending_send.respond_to);
                match serde_json::to_string(&pending_send.request) {
                    Ok(text) => { let _ = write_tx.send(Message::Text(text)); }
                    Err(e) => tracing::warn!(%e, "agent channel: failed to encode outbound request"),
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Ping(payload))) => {
                        last_ping = Instant::now();
                        let _ = write_tx.send(Message::Pong(payload));
                    }
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound_text(&text, executor, &pending, &write_tx).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!(%e, "agent channel: read error");
                        break;
                    }
                    _ => {}
                }
            }
            _ = tokio::time::sleep(HEARTBEAT_TIMEOUT) => {
                if last_ping.elapsed() > HEARTBEAT_TIMEOUT {
                    tracing::warn!("agent channel: no heartbeat from controller, reconnecting");
                    break;
                }
            }
        }
    }

    writer.abort();
}

async fn handle_inbound_text(
    text: &str,
    executor: &Arc<dyn CommandExecutor>,
    pending: &Arc<Mutex<HashMap<Uuid, oneshot::Sender<Response>>>>,
    write_tx: &mpsc::UnboundedSender<Message>,
) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        tracing::warn!("agent channel: received non-JSON frame");
        return;
    };

    if value.get("type").is_some() {
        let request: Request = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%e, "agent channel: malformed request envelope");
                return;
            }
        };
        let response = dispatch_request(&request, executor).await;
        if let Ok(text) = serde_json::to_string(&response) {
            let _ = write_tx.send(Message::Text(text));
        }
        return;
    }

    if value.get("status").is_some() {
        let Ok(response) = serde_json::from_value::<Response>(value) else {
            tracing::warn!("agent channel: malformed response envelope");
            return;
        };
        if let Some(respond_to) = pending.lock().remove(&response.id) {
            let _ = respond_to.send(response);
        }
    }
}

async fn dispatch_request(request: &Request, executor: &Arc<dyn CommandExecutor>) -> Response {
    match request.kind {
        RequestKind::Exec => {
            let payload: ExecPayload = match request.payload_as() {
                Ok(p) => p,
                Err(e) => return Response::error(request.id, 400, e.to_string()),
            };
            let result =
                executor.exec(&payload.cmd, Duration::from_secs(payload.timeout_secs)).await;
            Response::ok(request.id, &result)
                .unwrap_or_else(|e| Response::error(request.id, 500, e.to_string()))
        }
        RequestKind::ReadyProbe => {
            let ready = executor.ready().await;
            Response::ok(request.id, &ReadyPayload { ready })
                .unwrap_or_else(|e| Response::error(request.id, 500, e.to_string()))
        }
        RequestKind::Ping => Response::ok(request.id, &e2epool_wire::PongPayload::default())
            .unwrap_or_else(|e| Response::error(request.id, 500, e.to_string())),
        RequestKind::Create | RequestKind::Finalize | RequestKind::Status => Response::error(
            request.id,
            400,
            format!("{} is runner-initiated, not controller-initiated", request.kind),
        ),
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencode_passes_through_alphanumerics() {
        assert_eq!(urlencode("runner-1_abc.def"), "runner-1_abc.def");
    }

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("tok en&x"), "tok%20en%26x");
    }
}
