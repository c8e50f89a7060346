// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] e2epool_wire::ProtocolError),
    #[error("request timed out")]
    Timeout,
    #[error("runner {0:?} is not connected to this replica")]
    NotConnected(String),
    #[error("authentication failed for runner {0:?}")]
    AuthFailed(String),
    #[error("channel closed")]
    Closed,
}
