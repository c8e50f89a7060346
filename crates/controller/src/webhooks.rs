// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound CI webhooks (C9c, §4.9): the real-time alternative to the
//! poller. GitLab authenticates with a shared-secret header; GitHub signs
//! the raw body with HMAC-SHA256. Both translate a terminal job event into
//! `queue_finalize(source=webhook)` — safe to run alongside the poller
//! since `queue_finalize` is idempotent against an already-queued or
//! already-terminal checkpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use e2epool_core::FinalizeStatus;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::checkpoint_service::CheckpointService;
use crate::env::Config;

#[derive(Clone)]
pub struct WebhookState {
    pub checkpoints: Arc<CheckpointService>,
    pub gitlab_secret: Option<String>,
    pub github_secret: Option<String>,
}

impl WebhookState {
    pub fn new(checkpoints: Arc<CheckpointService>, config: &Config) -> Self {
        Self {
            checkpoints,
            gitlab_secret: config.gitlab_webhook_secret.clone(),
            github_secret: config.github_webhook_secret.clone(),
        }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhooks/gitlab", post(gitlab_webhook))
        .route("/webhooks/github", post(github_webhook))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct GitlabBuildEvent {
    build_id: i64,
    build_status: String,
}

async fn gitlab_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(expected) = state.gitlab_secret.as_deref() else {
        return StatusCode::NOT_FOUND;
    };
    let provided = headers.get("X-Gitlab-Token").and_then(|v| v.to_str().ok()).unwrap_or("");
    if !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        return StatusCode::UNAUTHORIZED;
    }

    let event: GitlabBuildEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(_) => return StatusCode::BAD_REQUEST,
    };

    let status = match event.build_status.as_str() {
        "success" => Some(FinalizeStatus::Success),
        "failed" => Some(FinalizeStatus::Failure),
        "canceled" | "cancelled" => Some(FinalizeStatus::Canceled),
        _ => None,
    };
    let Some(status) = status else {
        return StatusCode::OK;
    };

    dispatch_terminal(&state.checkpoints, &event.build_id.to_string(), status).await
}

#[derive(Debug, Deserialize)]
struct GithubWorkflowJobEvent {
    workflow_job: GithubWorkflowJob,
}

#[derive(Debug, Deserialize)]
struct GithubWorkflowJob {
    id: i64,
    status: String,
    conclusion: Option<String>,
}

async fn github_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(secret) = state.github_secret.as_deref() else {
        return StatusCode::NOT_FOUND;
    };
    let Some(signature) = headers.get("X-Hub-Signature-256").and_then(|v| v.to_str().ok()) else {
        return StatusCode::UNAUTHORIZED;
    };
    if !verify_github_signature(secret, &body, signature) {
        return StatusCode::UNAUTHORIZED;
    }

    let event: GithubWorkflowJobEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(_) => return StatusCode::BAD_REQUEST,
    };

    if event.workflow_job.status != "completed" {
        return StatusCode::OK;
    }
    let status = match event.workflow_job.conclusion.as_deref() {
        Some("success") => FinalizeStatus::Success,
        Some("cancelled") => FinalizeStatus::Canceled,
        _ => FinalizeStatus::Failure,
    };

    dispatch_terminal(&state.checkpoints, &event.workflow_job.id.to_string(), status).await
}

async fn dispatch_terminal(
    checkpoints: &CheckpointService,
    job_id: &str,
    status: FinalizeStatus,
) -> StatusCode {
    match checkpoints.queue_finalize_by_job_id(job_id, status, e2epool_core::FinalizeSource::Webhook).await {
        Ok(_) => StatusCode::OK,
        Err(crate::error::ServiceError::NotFound) => StatusCode::OK, // no active checkpoint for this job; nothing to do
        Err(e) => {
            tracing::warn!(job_id, error = %e, "webhook failed to queue finalize");
            StatusCode::OK
        }
    }
}

fn verify_github_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(hex_sig) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(sig_bytes) = hex_decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&sig_bytes).is_ok()
}

fn hex_decode(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_decode_round_trips_known_bytes() {
        assert_eq!(hex_decode("deadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(hex_decode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn hex_decode_rejects_odd_length_and_non_hex() {
        assert!(hex_decode("abc").is_err());
        assert!(hex_decode("zz").is_err());
    }

    #[test]
    fn constant_time_eq_matches_equal_slices() {
        assert!(constant_time_eq(b"shared-secret", b"shared-secret"));
    }

    #[test]
    fn constant_time_eq_rejects_mismatches_and_length_differences() {
        assert!(!constant_time_eq(b"shared-secret", b"shared-secrets"));
        assert!(!constant_time_eq(b"abc", b"abd"));
    }

    #[test]
    fn verify_github_signature_accepts_matching_hmac() {
        let secret = "webhook-secret";
        let body = b"{\"workflow_job\":{\"id\":1}}";
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let digest = mac.finalize().into_bytes();
        let hex_sig: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        let header = format!("sha256={hex_sig}");

        assert!(verify_github_signature(secret, body, &header));
        assert!(!verify_github_signature("wrong-secret", body, &header));
    }

    #[test]
    fn verify_github_signature_rejects_missing_prefix() {
        assert!(!verify_github_signature("secret", b"body", "deadbeef"));
    }
}
