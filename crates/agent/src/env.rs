// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment configuration for `e2epool-agentd`, one
//! `env.rs` per binary crate.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_AGENT_SOCKET: &str = "/run/e2epool/agent.sock";

#[derive(Debug, Clone)]
pub struct Config {
    pub runner_id: String,
    pub token: String,
    pub controller_ws_url: String,
    pub socket_path: PathBuf,
    pub readiness_cmd: Option<String>,
    pub command_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            runner_id: std::env::var("E2EPOOL_RUNNER_ID")
                .map_err(|_| ConfigError::Missing("E2EPOOL_RUNNER_ID"))?,
            token: std::env::var("E2EPOOL_RUNNER_TOKEN")
                .map_err(|_| ConfigError::Missing("E2EPOOL_RUNNER_TOKEN"))?,
            controller_ws_url: std::env::var("E2EPOOL_CONTROLLER_WS_URL")
                .map_err(|_| ConfigError::Missing("E2EPOOL_CONTROLLER_WS_URL"))?,
            socket_path: std::env::var("E2EPOOL_AGENT_SOCKET")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_AGENT_SOCKET)),
            readiness_cmd: std::env::var("E2EPOOL_READINESS_CMD").ok(),
            command_timeout: Duration::from_secs(env_u64("E2EPOOL_COMMAND_TIMEOUT_SECONDS", 120)),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_u64_falls_back_to_default_when_unset() {
        assert_eq!(env_u64("E2EPOOL_AGENT_TEST_ENV_U64_UNSET", 42), 42);
    }

    #[test]
    fn env_u64_parses_set_value() {
        std::env::set_var("E2EPOOL_AGENT_TEST_ENV_U64_SET", "17");
        assert_eq!(env_u64("E2EPOOL_AGENT_TEST_ENV_U64_SET", 42), 17);
        std::env::remove_var("E2EPOOL_AGENT_TEST_ENV_U64_SET");
    }

    #[test]
    fn env_u64_falls_back_to_default_on_unparseable_value() {
        std::env::set_var("E2EPOOL_AGENT_TEST_ENV_U64_BAD", "not-a-number");
        assert_eq!(env_u64("E2EPOOL_AGENT_TEST_ENV_U64_BAD", 42), 42);
        std::env::remove_var("E2EPOOL_AGENT_TEST_ENV_U64_BAD");
    }
}
