// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CiAdapterError {
    #[error("unknown ci adapter {0:?}")]
    UnknownAdapter(String),
    #[error("ci adapter http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ci adapter returned unexpected response: {0}")]
    UnexpectedResponse(String),
}
