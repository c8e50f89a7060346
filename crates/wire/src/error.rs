// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("json encode/decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown request type {0:?}")]
    UnknownType(String),
    #[error("response carried no data payload")]
    MissingData,
}
