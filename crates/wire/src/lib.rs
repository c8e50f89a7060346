// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message envelope shared by the agent channel (agent ⇄ controller) and the
//! local IPC surface (CLI ⇄ agent).
//!
//! Wire format for the local Unix-domain-socket transport: 4-byte length
//! prefix (big-endian) + JSON payload. The WebSocket transport carries the
//! same JSON envelope as text frames without the length prefix (the frame
//! boundary does that job instead).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod request;
mod response;
mod wire;

pub use error::ProtocolError;
pub use request::{
    CreatePayload, EmptyPayload, ExecPayload, FinalizePayload, Request, RequestKind,
    StatusPayload,
};
pub use response::{
    ExecResultPayload, PongPayload, ReadyPayload, Response, ResponseError, ResponseStatus,
};
pub use wire::{
    decode, encode, read_message, read_request, read_response, write_message, write_request,
    write_response,
};
