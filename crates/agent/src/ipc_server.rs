// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local Unix-domain-socket IPC surface (§4.6): the three CLI verbs
//! `create`/`finalize`/`status` arrive here length-prefixed JSON and are
//! forwarded over the agent channel to the controller. On graceful
//! shutdown, new connections stop being accepted, in-flight ones are given
//! a bounded grace period to finish, and the socket file is removed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use e2epool_channel::AgentChannelClient;
use e2epool_wire::{Request, RequestKind, Response};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct IpcServer {
    socket_path: PathBuf,
    channel: AgentChannelClient,
}

impl IpcServer {
    pub fn new(socket_path: impl Into<PathBuf>, channel: AgentChannelClient) -> Self {
        Self { socket_path: socket_path.into(), channel }
    }

    pub async fn serve(self, cancel: CancellationToken) -> std::io::Result<()> {
        if let Some(parent) = self.socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        remove_stale_socket(&self.socket_path).await;

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!(path = %self.socket_path.display(), "agent: ipc listener bound");

        let tracker = TaskTracker::new();
        let channel = self.channel.clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, _addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!(%e, "agent: ipc accept failed");
                            continue;
                        }
                    };
                    let channel = channel.clone();
                    tracker.spawn(async move {
                        if let Err(e) = handle_connection(stream, &channel).await {
                            tracing::warn!(%e, "agent: ipc connection error");
                        }
                    });
                }
            }
        }

        tracing::info!("agent: ipc listener draining in-flight requests");
        tracker.close();
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, tracker.wait()).await;

        let _ = tokio::fs::remove_file(&self.socket_path).await;
        Ok(())
    }
}

async fn remove_stale_socket(path: &Path) {
    if tokio::net::UnixStream::connect(path).await.is_err() {
        let _ = tokio::fs::remove_file(path).await;
    }
}

async fn handle_connection(
    mut stream: UnixStream,
    channel: &AgentChannelClient,
) -> Result<(), std::io::Error> {
    let request = match e2epool_wire::read_request(&mut stream).await {
        Ok(r) => r,
        Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
    };

    let response = dispatch(&request, channel).await;
    e2epool_wire::write_response(&mut stream, &response)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

async fn dispatch(request: &Request, channel: &AgentChannelClient) -> Response {
    let result = match request.kind {
        RequestKind::Create => {
            let payload: e2epool_wire::CreatePayload = match request.payload_as() {
                Ok(p) => p,
                Err(e) => return Response::error(request.id, 400, e.to_string()),
            };
            channel.create(&payload.job_id).await
        }
        RequestKind::Finalize => {
            let payload: e2epool_wire::FinalizePayload = match request.payload_as() {
                Ok(p) => p,
                Err(e) => return Response::error(request.id, 400, e.to_string()),
            };
            channel.finalize(&payload.checkpoint_name, &payload.status).await
        }
        RequestKind::Status => {
            let payload: e2epool_wire::StatusPayload = match request.payload_as() {
                Ok(p) => p,
                Err(e) => return Response::error(request.id, 400, e.to_string()),
            };
            channel.status(&payload.checkpoint_name).await
        }
        other => return Response::error(request.id, 400, format!("{other} is not a local IPC verb")),
    };

    match result {
        Ok(data) => Response::ok(request.id, &data)
            .unwrap_or_else(|e| Response::error(request.id, 500, e.to_string())),
        Err(e) => {
            let code = match e {
                e2epool_channel::ChannelError::Timeout => 504,
                _ => 503,
            };
            Response::error(request.id, code, e.to_string())
        }
    }
}
