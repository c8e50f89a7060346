// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `e2epool finalize` — sends a `finalize` local-IPC request; this is what
//! the CI job's post-job hook invokes (`source=hook` per the agent channel
//! contract).

use e2epool_wire::{FinalizePayload, Request, RequestKind};

use crate::client::AgentClient;
use crate::exit_error::ExitError;

pub async fn run(
    client: &AgentClient,
    checkpoint_name: String,
    status: String,
) -> Result<(), ExitError> {
    let request = Request::new(
        RequestKind::Finalize,
        &FinalizePayload { checkpoint_name, status, source: "hook".to_string() },
    )
    .map_err(|e| ExitError::remote(e.to_string()))?;
    client.send_ok(&request).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_source_to_hook() {
        let request = Request::new(
            RequestKind::Finalize,
            &FinalizePayload {
                checkpoint_name: "job-1-1-aaaaaaaa".to_string(),
                status: "success".to_string(),
                source: "hook".to_string(),
            },
        )
        .unwrap();
        let payload: FinalizePayload = request.payload_as().unwrap();
        assert_eq!(payload.source, "hook");
    }
}
