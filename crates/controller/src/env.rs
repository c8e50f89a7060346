// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment configuration for `e2epoold` (§6.3), one
//! `env.rs` per binary crate.

use std::time::Duration;

/// Everything the controller binary reads from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub internal_bind_addr: String,
    pub admin_token: String,

    pub checkpoint_ttl_seconds: i64,
    pub gc_interval_seconds: u64,
    pub reconcile_interval_seconds: u64,
    pub poller_interval_seconds: u64,
    pub poller_min_age_seconds: i64,
    pub poller_enabled: bool,
    pub finalize_cooldown_seconds: i64,

    pub readiness_timeout: Duration,
    pub readiness_poll_interval: Duration,

    pub finalize_task_soft_limit: Duration,
    pub finalize_task_hard_limit: Duration,
    pub poller_task_soft_limit: Duration,
    pub poller_task_hard_limit: Duration,

    pub ws_heartbeat_interval: Duration,
    pub ws_heartbeat_timeout: Duration,
    pub http_client_timeout: Duration,
    pub query_batch_size: i64,

    pub ci_adapter: String,
    pub ci_base_url: Option<String>,
    pub ci_token: Option<String>,

    pub gitlab_webhook_secret: Option<String>,
    pub github_webhook_secret: Option<String>,

    pub peer_internal_base_urls: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: env_string("E2EPOOL_BIND_ADDR", "0.0.0.0:8080"),
            internal_bind_addr: env_string("E2EPOOL_INTERNAL_BIND_ADDR", "127.0.0.1:8081"),
            admin_token: std::env::var("E2EPOOL_ADMIN_TOKEN")
                .map_err(|_| ConfigError::Missing("E2EPOOL_ADMIN_TOKEN"))?,

            checkpoint_ttl_seconds: env_i64("E2EPOOL_CHECKPOINT_TTL_SECONDS", 1800),
            gc_interval_seconds: env_u64("E2EPOOL_GC_INTERVAL_SECONDS", 60),
            reconcile_interval_seconds: env_u64("E2EPOOL_RECONCILE_INTERVAL_SECONDS", 120),
            poller_interval_seconds: env_u64("E2EPOOL_POLLER_INTERVAL_SECONDS", 20),
            poller_min_age_seconds: env_i64("E2EPOOL_POLLER_MIN_AGE_SECONDS", 120),
            poller_enabled: env_bool("E2EPOOL_POLLER_ENABLED", true),
            finalize_cooldown_seconds: env_i64("E2EPOOL_FINALIZE_COOLDOWN_SECONDS", 5),

            readiness_timeout: Duration::from_secs(env_u64("E2EPOOL_READINESS_TIMEOUT_SECONDS", 120)),
            readiness_poll_interval: Duration::from_secs(env_u64(
                "E2EPOOL_READINESS_POLL_INTERVAL_SECONDS",
                5,
            )),

            finalize_task_soft_limit: Duration::from_secs(env_u64(
                "E2EPOOL_FINALIZE_TASK_SOFT_LIMIT_SECONDS",
                300,
            )),
            finalize_task_hard_limit: Duration::from_secs(env_u64(
                "E2EPOOL_FINALIZE_TASK_HARD_LIMIT_SECONDS",
                330,
            )),
            poller_task_soft_limit: Duration::from_secs(env_u64(
                "E2EPOOL_POLLER_TASK_SOFT_LIMIT_SECONDS",
                120,
            )),
            poller_task_hard_limit: Duration::from_secs(env_u64(
                "E2EPOOL_POLLER_TASK_HARD_LIMIT_SECONDS",
                150,
            )),

            ws_heartbeat_interval: Duration::from_secs(env_u64("E2EPOOL_WS_HEARTBEAT_INTERVAL_SECONDS", 30)),
            ws_heartbeat_timeout: Duration::from_secs(env_u64("E2EPOOL_WS_HEARTBEAT_TIMEOUT_SECONDS", 90)),
            http_client_timeout: Duration::from_secs(env_u64("E2EPOOL_HTTP_CLIENT_TIMEOUT_SECONDS", 30)),
            query_batch_size: env_i64("E2EPOOL_QUERY_BATCH_SIZE", 200),

            ci_adapter: env_string("E2EPOOL_CI_ADAPTER", "gitlab"),
            ci_base_url: std::env::var("E2EPOOL_CI_BASE_URL").ok(),
            ci_token: std::env::var("E2EPOOL_CI_TOKEN").ok(),

            gitlab_webhook_secret: std::env::var("E2EPOOL_GITLAB_WEBHOOK_SECRET").ok(),
            github_webhook_secret: std::env::var("E2EPOOL_GITHUB_WEBHOOK_SECRET").ok(),

            peer_internal_base_urls: std::env::var("E2EPOOL_PEER_INTERNAL_BASE_URLS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
