// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint service error kinds (§7) and their HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("malformed request: {0}")]
    Validation(String),
    #[error("authentication failed")]
    Unauthorized,
    #[error("runner does not own this resource")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("an active checkpoint already exists for this runner")]
    Conflict,
    #[error("finalize cooldown still in effect")]
    Cooldown,
    #[error("backend operation failed: {0}")]
    Backend(String),
    #[error("ci adapter error: {0}")]
    CiAdapter(String),
    #[error("store error: {0}")]
    Store(#[from] e2epool_store::StoreError),
    #[error("task enqueue failed: {0}")]
    Broker(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Cooldown => StatusCode::TOO_MANY_REQUESTS,
            Self::Backend(_) | Self::CiAdapter(_) | Self::Broker(_) | Self::Store(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

impl ServiceError {
    /// Maps to the `(code, detail)` shape the agent channel's
    /// [`e2epool_channel::ChannelHandler`] responses use.
    pub fn as_code_detail(&self) -> (u16, String) {
        let code = match self {
            Self::Validation(_) => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Cooldown => 429,
            Self::Backend(_) | Self::CiAdapter(_) | Self::Broker(_) | Self::Store(_) => 503,
        };
        (code, self.to_string())
    }
}
