// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GitLab reference adapter (§4.5): job status via `GET /api/v4/jobs/{id}`,
//! pause/unpause via `PUT /api/v4/runners/{id}` with `paused`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapter::{CiAdapter, JobStatus};
use crate::error::CiAdapterError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GitlabAdapter {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl GitlabAdapter {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Overrides the inner HTTP client — used by tests to point at a mock
    /// server via `reqwest::Client::new()` plus a `base_url` override.
    #[cfg(any(test, feature = "test-support"))]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    status: String,
}

fn map_status(status: &str) -> JobStatus {
    match status {
        "running" | "pending" | "created" | "scheduled" | "waiting_for_resource"
        | "preparing" | "manual" => JobStatus::Running,
        "success" => JobStatus::Success,
        "failed" => JobStatus::Failed,
        "canceled" | "canceling" | "skipped" => JobStatus::Canceled,
        _ => JobStatus::Unknown,
    }
}

#[async_trait]
impl CiAdapter for GitlabAdapter {
    async fn get_job_status(&self, job_id: &str) -> JobStatus {
        let url = format!("{}/api/v4/jobs/{job_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await;
        let response = match response {
            Ok(r) => r,
            Err(_) => return JobStatus::Unknown,
        };
        if !response.status().is_success() {
            return JobStatus::Unknown;
        }
        match response.json::<JobResponse>().await {
            Ok(body) => map_status(&body.status),
            Err(_) => JobStatus::Unknown,
        }
    }

    async fn pause_runner(&self, ci_runner_id: &str) -> Result<(), CiAdapterError> {
        self.set_paused(ci_runner_id, true).await
    }

    async fn unpause_runner(&self, ci_runner_id: &str) -> Result<(), CiAdapterError> {
        self.set_paused(ci_runner_id, false).await
    }
}

impl GitlabAdapter {
    async fn set_paused(&self, ci_runner_id: &str, paused: bool) -> Result<(), CiAdapterError> {
        let url = format!("{}/api/v4/runners/{ci_runner_id}", self.base_url);
        let response = self
            .client
            .put(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&serde_json::json!({ "paused": paused }))
            .send()
            .await?;
        // Idempotent by construction (§4.8): an already-(un)paused runner
        // returning 400 is treated the same as 200, never an error.
        if response.status().is_success() || response.status().as_u16() == 400 {
            Ok(())
        } else {
            Err(CiAdapterError::UnexpectedResponse(format!(
                "gitlab runner pause/unpause returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_status_collapses_gitlab_vocabulary_to_canonical_four() {
        assert_eq!(map_status("pending"), JobStatus::Running);
        assert_eq!(map_status("success"), JobStatus::Success);
        assert_eq!(map_status("failed"), JobStatus::Failed);
        assert_eq!(map_status("canceled"), JobStatus::Canceled);
        assert_eq!(map_status("something_new"), JobStatus::Unknown);
    }

    #[tokio::test]
    async fn get_job_status_returns_unknown_on_network_error() {
        let adapter = GitlabAdapter::new("http://127.0.0.1:1", "tok");
        let status = adapter.get_job_status("123").await;
        assert_eq!(status, JobStatus::Unknown);
    }
}
