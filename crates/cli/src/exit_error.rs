// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination. Exit codes
//! follow the local IPC surface contract: 0 ok, 1 remote error, 2 agent not
//! reachable.

use std::fmt;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(1, message)
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

impl From<crate::client::ClientError> for ExitError {
    fn from(err: crate::client::ClientError) -> Self {
        match err {
            crate::client::ClientError::Io(e) => Self::unreachable(e.to_string()),
            crate::client::ClientError::Protocol(e) => Self::unreachable(e.to_string()),
            crate::client::ClientError::Remote { code, detail } => {
                Self::remote(format!("agent returned error {code}: {detail}"))
            }
        }
    }
}
