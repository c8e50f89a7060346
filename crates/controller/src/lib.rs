// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! e2epool-controller: the stateless control-plane service — checkpoint
//! service (C7), finalize worker (C8), completion detector (C9: hook via
//! the agent channel, poller C9b, webhook C9c), garbage collector (C10),
//! reconciler (C11), and the HTTP/WS API surface.

pub mod auth;
pub mod channel_handler;
pub mod checkpoint_service;
pub mod env;
pub mod error;
pub mod finalize_worker;
pub mod gc;
pub mod http;
pub mod pipeline;
pub mod poller;
pub mod reconciler;
pub mod webhooks;

pub use channel_handler::{ControllerChannelHandler, ControllerRunnerAuthenticator};
pub use checkpoint_service::{CheckpointService, QueueFinalizeOutcome};
pub use env::Config;
pub use error::ServiceError;
pub use finalize_worker::FinalizeWorker;
pub use gc::GarbageCollector;
pub use poller::Poller;
pub use reconciler::Reconciler;
