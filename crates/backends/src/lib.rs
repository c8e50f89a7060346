// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! e2epool-backends: the backend driver trait (C4) and the `proxmox` /
//! `bare_metal` implementations.

pub mod bare_metal;
pub mod driver;
pub mod error;
pub mod executor;
pub mod proxmox;

pub use bare_metal::BareMetalBackend;
pub use driver::{BackendDriver, READINESS_POLL_INTERVAL};
pub use error::BackendError;
pub use executor::{ExecResult, RunnerExecutor};
pub use proxmox::ProxmoxBackend;

use std::sync::Arc;

/// Picks the driver matching a runner's declared backend kind.
pub fn resolve(kind: e2epool_core::BackendKind, executor: Arc<dyn RunnerExecutor>) -> Arc<dyn BackendDriver> {
    match kind {
        e2epool_core::BackendKind::Proxmox => Arc::new(ProxmoxBackend::new(executor)),
        e2epool_core::BackendKind::BareMetal => Arc::new(BareMetalBackend::new(executor)),
    }
}
