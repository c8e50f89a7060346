// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `e2epool create` — sends a `create` local-IPC request to the agent,
//! prints the resulting checkpoint name to stdout. This is what a CI job's
//! setup step invokes.

use e2epool_wire::{CreatePayload, Request, RequestKind};

use crate::client::AgentClient;
use crate::exit_error::ExitError;

pub async fn run(client: &AgentClient, job_id: String) -> Result<(), ExitError> {
    let request = Request::new(RequestKind::Create, &CreatePayload { job_id })
        .map_err(|e| ExitError::remote(e.to_string()))?;
    let response = client.send_ok(&request).await?;

    #[derive(serde::Deserialize)]
    struct CreateData {
        name: String,
    }
    let data: CreateData = response
        .data_as()
        .map_err(|e| ExitError::remote(format!("malformed create response: {e}")))?;
    println!("{}", data.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_job_id_payload() {
        let request =
            Request::new(RequestKind::Create, &CreatePayload { job_id: "100".to_string() })
                .unwrap();
        assert_eq!(request.kind, RequestKind::Create);
        let payload: CreatePayload = request.payload_as().unwrap();
        assert_eq!(payload.job_id, "100");
    }
}
