// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! e2epool-agent: the runner-host process. Owns the outbound agent channel
//! connection to the controller and the local Unix-socket IPC surface the
//! three CLI verbs talk to.

pub mod env;
pub mod executor;
pub mod ipc_server;

pub use env::Config;
pub use executor::ShellCommandExecutor;
pub use ipc_server::IpcServer;
