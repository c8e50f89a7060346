// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner registry row: identity, backend classification, and CI routing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend classification (§3.1, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Proxmox,
    BareMetal,
}

crate::simple_display! {
    BackendKind {
        Proxmox => "proxmox",
        BareMetal => "bare_metal",
    }
}

impl std::str::FromStr for BackendKind {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proxmox" => Ok(Self::Proxmox),
            "bare_metal" => Ok(Self::BareMetal),
            other => Err(RunnerError::InvalidBackendKind(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("runner_id must be non-empty")]
    EmptyRunnerId,
    #[error("invalid backend kind {0:?}, expected \"proxmox\" or \"bare_metal\"")]
    InvalidBackendKind(String),
    #[error("backend \"proxmox\" requires hypervisor_host, hypervisor_token_name, hypervisor_token_secret, hypervisor_node, and hypervisor_vmid")]
    MissingHypervisorFields,
    #[error("backend \"bare_metal\" requires reset_cmd")]
    MissingResetCmd,
}

/// Hypervisor-specific fields, mandatory only when `backend == Proxmox`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HypervisorFields {
    pub host: Option<String>,
    pub token_name: Option<String>,
    pub token_secret: Option<String>,
    pub node: Option<String>,
    pub vmid: Option<String>,
}

impl HypervisorFields {
    fn is_complete(&self) -> bool {
        self.host.is_some()
            && self.token_name.is_some()
            && self.token_secret.is_some()
            && self.node.is_some()
            && self.vmid.is_some()
    }
}

/// A record describing a single executable host (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runner {
    pub runner_id: String,
    pub token: String,
    pub backend: BackendKind,
    pub ci_adapter: String,

    #[serde(flatten)]
    pub hypervisor: HypervisorFields,

    pub reset_cmd: Option<String>,
    pub cleanup_cmd: Option<String>,
    pub readiness_cmd: Option<String>,

    pub ci_base_url: String,
    pub ci_token: String,
    pub ci_runner_id: Option<String>,

    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Runner {
    /// Validates the cross-field invariants in §3.1: hypervisor fields are
    /// mandatory for `proxmox`, `reset_cmd` is mandatory for `bare_metal`.
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.runner_id.is_empty() {
            return Err(RunnerError::EmptyRunnerId);
        }
        match self.backend {
            BackendKind::Proxmox if !self.hypervisor.is_complete() => {
                Err(RunnerError::MissingHypervisorFields)
            }
            BackendKind::BareMetal if self.reset_cmd.is_none() => Err(RunnerError::MissingResetCmd),
            _ => Ok(()),
        }
    }

    /// Whether pause/unpause should be attempted against the CI adapter.
    pub fn has_ci_routing(&self) -> bool {
        self.ci_runner_id.is_some()
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct RunnerBuilder => Runner {
        into { runner_id: String = "r1" }
        into { token: String = "tok-deadbeef" }
        set { backend: BackendKind = BackendKind::BareMetal }
        into { ci_adapter: String = "gitlab" }
        set { hypervisor: HypervisorFields = HypervisorFields::default() }
        option { reset_cmd: String = None }
        option { cleanup_cmd: String = None }
        option { readiness_cmd: String = None }
        into { ci_base_url: String = "https://gitlab.example.com" }
        into { ci_token: String = "glpat-test" }
        option { ci_runner_id: String = None }
        set { is_active: bool = true }
        computed { created_at: chrono::DateTime<chrono::Utc> = chrono::Utc::now() }
        computed { updated_at: chrono::DateTime<chrono::Utc> = chrono::Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_metal_requires_reset_cmd() {
        let runner = Runner::builder().backend(BackendKind::BareMetal).build();
        assert_eq!(runner.validate(), Err(RunnerError::MissingResetCmd));
    }

    #[test]
    fn proxmox_requires_hypervisor_fields() {
        let runner = Runner::builder().backend(BackendKind::Proxmox).build();
        assert_eq!(runner.validate(), Err(RunnerError::MissingHypervisorFields));
    }

    #[test]
    fn proxmox_with_full_hypervisor_fields_is_valid() {
        let runner = Runner::builder()
            .backend(BackendKind::Proxmox)
            .hypervisor(HypervisorFields {
                host: Some("pve.example.com".into()),
                token_name: Some("e2epool".into()),
                token_secret: Some("secret".into()),
                node: Some("pve1".into()),
                vmid: Some("101".into()),
            })
            .build();
        assert!(runner.validate().is_ok());
    }

    #[test]
    fn has_ci_routing_reflects_ci_runner_id() {
        let without = Runner::builder().build();
        assert!(!without.has_ci_routing());
        let with = Runner::builder().ci_runner_id("42").build();
        assert!(with.has_ci_routing());
    }
}
