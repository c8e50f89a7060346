// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin client for the agent's local IPC Unix socket.

use std::path::Path;

use e2epool_wire::{ProtocolError, Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;

use crate::env;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("agent returned error {code}: {detail}")]
    Remote { code: u16, detail: String },
}

pub struct AgentClient {
    socket_path: std::path::PathBuf,
}

impl AgentClient {
    pub fn connect_default() -> Self {
        Self { socket_path: env::agent_socket_path() }
    }

    #[cfg(test)]
    pub fn with_socket_path(path: impl AsRef<Path>) -> Self {
        Self { socket_path: path.as_ref().to_path_buf() }
    }

    /// Opens a fresh connection, sends `request`, and waits for the matching
    /// response. Bounded by [`env::ipc_timeout`]; a timeout surfaces as an
    /// `Io` error so callers map it to exit code 2.
    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let connect = UnixStream::connect(&self.socket_path);
        let mut stream = tokio::time::timeout(env::ipc_timeout(), connect)
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??;

        let roundtrip = async {
            e2epool_wire::write_request(&mut stream, request).await?;
            e2epool_wire::read_response(&mut stream).await
        };
        let response = tokio::time::timeout(env::ipc_timeout(), roundtrip)
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "request timed out"))??;

        if response.id != request.id {
            return Err(ClientError::Protocol(ProtocolError::UnknownType(
                "response id mismatch".to_string(),
            )));
        }
        Ok(response)
    }

    /// Sends `request` and unwraps a successful response's `data`, turning an
    /// error response into [`ClientError::Remote`].
    pub async fn send_ok(&self, request: &Request) -> Result<Response, ClientError> {
        let response = self.send(request).await?;
        if response.is_ok() {
            Ok(response)
        } else {
            let error = response.error.unwrap_or(e2epool_wire::ResponseError {
                code: 500,
                detail: "unknown error".to_string(),
            });
            Err(ClientError::Remote { code: error.code, detail: error.detail })
        }
    }
}
