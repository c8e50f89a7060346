// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hypervisor backend (§4.4): Proxmox VE's REST API for snapshot
//! create/delete and power-cycle/rollback, the agent channel for
//! `cleanup_cmd`/`readiness_cmd`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use e2epool_core::{FinalizeStatus, Runner};
use serde::Deserialize;
use tracing::{info, warn};

use crate::driver::{BackendDriver, READINESS_POLL_INTERVAL};
use crate::error::BackendError;
use crate::executor::RunnerExecutor;

const TASK_POLL_INTERVAL: Duration = Duration::from_secs(2);
const TASK_POLL_TIMEOUT: Duration = Duration::from_secs(300);
const EXEC_TIMEOUT: Duration = Duration::from_secs(120);

/// The snapshot name used for every checkpoint — the single-active
/// invariant guarantees at most one is live per VM, so the snapshot tree
/// never branches (§4.4's "tie-breaks" note).
const SNAPSHOT_NAME: &str = "e2epool";

#[derive(Debug, Deserialize)]
struct TaskResponse {
    data: String,
}

#[derive(Debug, Deserialize)]
struct TaskStatus {
    data: TaskStatusData,
}

#[derive(Debug, Deserialize)]
struct TaskStatusData {
    status: String,
    #[serde(default)]
    exitstatus: Option<String>,
}

pub struct ProxmoxBackend {
    client: reqwest::Client,
    executor: Arc<dyn RunnerExecutor>,
}

impl ProxmoxBackend {
    pub fn new(executor: Arc<dyn RunnerExecutor>) -> Self {
        Self { client: reqwest::Client::new(), executor }
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn auth_header(&self, runner: &Runner) -> Result<String, BackendError> {
        let token_name = runner
            .hypervisor
            .token_name
            .as_deref()
            .ok_or_else(|| BackendError::Hypervisor("missing hypervisor_token_name".to_string()))?;
        let token_secret = runner
            .hypervisor
            .token_secret
            .as_deref()
            .ok_or_else(|| BackendError::Hypervisor("missing hypervisor_token_secret".to_string()))?;
        Ok(format!("PVEAPIToken={token_name}={token_secret}"))
    }

    fn vm_base_url(&self, runner: &Runner) -> Result<String, BackendError> {
        let host = runner
            .hypervisor
            .host
            .as_deref()
            .ok_or_else(|| BackendError::Hypervisor("missing hypervisor_host".to_string()))?;
        let node = runner
            .hypervisor
            .node
            .as_deref()
            .ok_or_else(|| BackendError::Hypervisor("missing hypervisor_node".to_string()))?;
        let vmid = runner
            .hypervisor
            .vmid
            .as_deref()
            .ok_or_else(|| BackendError::Hypervisor("missing hypervisor_vmid".to_string()))?;
        Ok(format!("https://{host}/api2/json/nodes/{node}/qemu/{vmid}"))
    }

    /// Issues a Proxmox action that returns an async task UPID, then polls
    /// `/tasks/{upid}/status` until it leaves `running`.
    async fn run_task(&self, runner: &Runner, url: &str) -> Result<(), BackendError> {
        let auth = self.auth_header(runner)?;
        let response = self.client.post(url).header("Authorization", &auth).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::Hypervisor(format!("{url} returned {}", response.status())));
        }
        let task: TaskResponse = response.json().await?;
        self.wait_for_task(runner, &task.data).await
    }

    async fn wait_for_task(&self, runner: &Runner, upid: &str) -> Result<(), BackendError> {
        let host = runner.hypervisor.host.as_deref().unwrap_or_default();
        let node = runner.hypervisor.node.as_deref().unwrap_or_default();
        let url = format!("https://{host}/api2/json/nodes/{node}/tasks/{upid}/status");
        let auth = self.auth_header(runner)?;
        let deadline = Instant::now() + TASK_POLL_TIMEOUT;

        loop {
            let response = self.client.get(&url).header("Authorization", &auth).send().await?;
            let status: TaskStatus = response.json().await?;
            if status.data.status != "running" {
                return match status.data.exitstatus.as_deref() {
                    Some("OK") | None => Ok(()),
                    Some(other) => Err(BackendError::Hypervisor(format!("task {upid} failed: {other}"))),
                };
            }
            if Instant::now() >= deadline {
                return Err(BackendError::Hypervisor(format!("task {upid} timed out")));
            }
            tokio::time::sleep(TASK_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl BackendDriver for ProxmoxBackend {
    async fn create_checkpoint(&self, runner: &Runner, checkpoint_name: &str) -> Result<(), BackendError> {
        let url = format!("{}/snapshot", self.vm_base_url(runner)?);
        info!(checkpoint = checkpoint_name, "creating hypervisor snapshot");
        let auth = self.auth_header(runner)?;
        let response = self
            .client
            .post(&url)
            .header("Authorization", &auth)
            .form(&[("snapname", SNAPSHOT_NAME)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BackendError::Hypervisor(format!(
                "snapshot create returned {}",
                response.status()
            )));
        }
        let task: TaskResponse = response.json().await?;
        self.wait_for_task(runner, &task.data).await
    }

    async fn reset(
        &self,
        runner: &Runner,
        checkpoint_name: &str,
        status: FinalizeStatus,
    ) -> Result<(), BackendError> {
        if status == FinalizeStatus::Success {
            if let Some(cleanup_cmd) = &runner.cleanup_cmd {
                let result = self
                    .executor
                    .exec(&runner.runner_id, cleanup_cmd, EXEC_TIMEOUT)
                    .await?;
                if !result.succeeded() {
                    warn!(checkpoint = checkpoint_name, "cleanup_cmd failed, proceeding anyway");
                }
            }
            return self.delete_snapshot(runner).await;
        }

        // stop (idempotent against an already-stopped VM) -> rollback -> start -> delete snapshot
        let base = self.vm_base_url(runner)?;
        if let Err(err) = self.run_task(runner, &format!("{base}/status/stop")).await {
            warn!(error = %err, "stop returned an error, assuming VM was already stopped");
        }
        self.run_task(runner, &format!("{base}/snapshot/{SNAPSHOT_NAME}/rollback")).await?;
        self.run_task(runner, &format!("{base}/status/start")).await?;
        self.delete_snapshot(runner).await
    }

    async fn readiness_wait(&self, runner: &Runner, timeout: Duration) -> Result<(), BackendError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.executor.is_connected(&runner.runner_id).await {
                let ready = match &runner.readiness_cmd {
                    Some(cmd) => self
                        .executor
                        .exec(&runner.runner_id, cmd, EXEC_TIMEOUT)
                        .await
                        .map(|r| r.succeeded())
                        .unwrap_or(false),
                    None => true,
                };
                if ready {
                    return Ok(());
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BackendError::ReadinessTimeout);
            }
            tokio::time::sleep(READINESS_POLL_INTERVAL.min(remaining)).await;
        }
    }
}

impl ProxmoxBackend {
    async fn delete_snapshot(&self, runner: &Runner) -> Result<(), BackendError> {
        let url = format!("{}/snapshot/{SNAPSHOT_NAME}", self.vm_base_url(runner)?);
        self.run_task(runner, &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeExecutor;

    #[async_trait]
    impl RunnerExecutor for FakeExecutor {
        async fn exec(&self, _runner_id: &str, _cmd: &str, _timeout: Duration) -> Result<crate::executor::ExecResult, BackendError> {
            Ok(crate::executor::ExecResult { exit_code: 0, stdout: String::new(), stderr: String::new() })
        }

        async fn is_connected(&self, _runner_id: &str) -> bool {
            true
        }
    }

    fn runner() -> Runner {
        e2epool_core::Runner::builder()
            .backend(e2epool_core::BackendKind::Proxmox)
            .hypervisor(e2epool_core::HypervisorFields {
                host: Some("pve.example.com".to_string()),
                token_name: Some("e2epool@pve!token".to_string()),
                token_secret: Some("secret".to_string()),
                node: Some("pve1".to_string()),
                vmid: Some("101".to_string()),
            })
            .build()
    }

    #[test]
    fn vm_base_url_embeds_node_and_vmid() {
        let backend = ProxmoxBackend::new(Arc::new(FakeExecutor));
        let url = backend.vm_base_url(&runner()).unwrap();
        assert_eq!(url, "https://pve.example.com/api2/json/nodes/pve1/qemu/101");
    }

    #[test]
    fn auth_header_has_pveapitoken_format() {
        let backend = ProxmoxBackend::new(Arc::new(FakeExecutor));
        let header = backend.auth_header(&runner()).unwrap();
        assert!(header.starts_with("PVEAPIToken="));
    }

    #[test]
    fn missing_hypervisor_fields_error_on_url_build() {
        let backend = ProxmoxBackend::new(Arc::new(FakeExecutor));
        let mut r = runner();
        r.hypervisor.vmid = None;
        assert!(backend.vm_base_url(&r).is_err());
    }
}
