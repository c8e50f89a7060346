// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment configuration, one `env.rs` per binary crate.

use std::path::PathBuf;

const DEFAULT_AGENT_SOCKET: &str = "/run/e2epool/agent.sock";

/// Path to the agent's local IPC Unix socket (`E2EPOOL_AGENT_SOCKET`).
pub fn agent_socket_path() -> PathBuf {
    std::env::var("E2EPOOL_AGENT_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_AGENT_SOCKET))
}

/// Timeout for a single IPC round-trip (`E2EPOOL_IPC_TIMEOUT_MS`, default 5s).
pub fn ipc_timeout() -> std::time::Duration {
    let ms = std::env::var("E2EPOOL_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5_000);
    std::time::Duration::from_millis(ms)
}
