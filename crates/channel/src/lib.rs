// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! e2epool-channel: the persistent bidirectional agent channel (C6) —
//! controller-side WebSocket server, agent-side reconnecting client, the
//! per-replica connection registry, and the cross-replica internal HTTP
//! dispatch hop.

pub mod backoff;
pub mod client;
pub mod error;
pub mod internal;
pub mod registry;
pub mod server;

pub use backoff::delay_for_attempt;
pub use client::{AgentChannelClient, CommandExecutor};
pub use error::ChannelError;
pub use internal::{internal_router, InternalExecRequest, InternalExecResponse, MeshedExecutor};
pub use registry::{ConnectionRegistry, PendingSend};
pub use server::{router, ChannelHandler, ChannelState, RunnerAuthenticator};
