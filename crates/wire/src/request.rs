// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The request half of the message envelope (§4.6): `{ id, type, payload }`,
//! shared by the agent channel (agent ⇄ controller) and the local IPC
//! surface (CLI ⇄ agent).

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::ProtocolError;

/// Discriminant for `type`. `create`/`finalize`/`status` originate from the
/// runner; `exec`/`ready_probe` originate from the controller; `ping` is
/// bidirectional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Create,
    Finalize,
    Status,
    Ping,
    Exec,
    ReadyProbe,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Finalize => "finalize",
            Self::Status => "status",
            Self::Ping => "ping",
            Self::Exec => "exec",
            Self::ReadyProbe => "ready_probe",
        };
        f.write_str(s)
    }
}

/// A request envelope. `payload` is left as a [`serde_json::Value`] at the
/// envelope layer; callers decode it with [`Request::payload_as`] once the
/// `type` tag has been dispatched on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub payload: serde_json::Value,
}

impl Request {
    pub fn new<T: Serialize>(kind: RequestKind, payload: &T) -> Result<Self, ProtocolError> {
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(self.payload.clone()).map_err(ProtocolError::from)
    }
}

/// Body of a `create` request (runner → controller).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePayload {
    pub job_id: String,
}

/// Body of a `finalize` request (runner → controller).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizePayload {
    pub checkpoint_name: String,
    pub status: String,
    #[serde(default = "default_finalize_source")]
    pub source: String,
}

fn default_finalize_source() -> String {
    "agent".to_string()
}

/// Body of a `status` request (runner → controller).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPayload {
    pub checkpoint_name: String,
}

/// Body of an `exec` request (controller → runner).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecPayload {
    pub cmd: String,
    pub timeout_secs: u64,
}

/// Empty payload shared by `ping` and `ready_probe`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyPayload {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_round_trips_typed_payload() {
        let req = Request::new(
            RequestKind::Create,
            &CreatePayload { job_id: "100".to_string() },
        )
        .unwrap();
        assert_eq!(req.kind, RequestKind::Create);
        let payload: CreatePayload = req.payload_as().unwrap();
        assert_eq!(payload.job_id, "100");
    }

    #[test]
    fn finalize_payload_defaults_source_to_agent() {
        let json = r#"{"checkpoint_name":"job-1-1-aaaaaaaa","status":"success"}"#;
        let payload: FinalizePayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.source, "agent");
    }

    #[test]
    fn envelope_serializes_type_and_payload_as_sibling_fields() {
        let req = Request::new(RequestKind::Status, &StatusPayload {
            checkpoint_name: "job-1-1-aaaaaaaa".to_string(),
        })
        .unwrap();
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "status");
        assert!(value.get("payload").is_some());
        assert!(value.get("id").is_some());
    }
}
