// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `e2epool status` — sends a `status` local-IPC request, prints the record
//! as JSON.

use e2epool_wire::{Request, RequestKind, StatusPayload};

use crate::client::AgentClient;
use crate::exit_error::ExitError;

pub async fn run(client: &AgentClient, checkpoint_name: String) -> Result<(), ExitError> {
    let request = Request::new(RequestKind::Status, &StatusPayload { checkpoint_name })
        .map_err(|e| ExitError::remote(e.to_string()))?;
    let response = client.send_ok(&request).await?;

    let data = response.data.unwrap_or(serde_json::Value::Null);
    let pretty = serde_json::to_string_pretty(&data)
        .map_err(|e| ExitError::remote(format!("malformed status response: {e}")))?;
    println!("{pretty}");
    Ok(())
}
