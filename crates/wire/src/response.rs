// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The response half of the message envelope (§4.6):
//! `{ id, status, data?, error? }`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// A structured error: an application-defined numeric code (HTTP-style) plus
/// a short human-readable detail string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: u16,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn ok<T: Serialize>(id: Uuid, data: &T) -> Result<Self, ProtocolError> {
        Ok(Self {
            id,
            status: ResponseStatus::Ok,
            data: Some(serde_json::to_value(data)?),
            error: None,
        })
    }

    pub fn ok_empty(id: Uuid) -> Self {
        Self { id, status: ResponseStatus::Ok, data: None, error: None }
    }

    pub fn error(id: Uuid, code: u16, detail: impl Into<String>) -> Self {
        Self {
            id,
            status: ResponseStatus::Error,
            data: None,
            error: Some(ResponseError { code, detail: detail.into() }),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, ResponseStatus::Ok)
    }

    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        match &self.data {
            Some(v) => serde_json::from_value(v.clone()).map_err(ProtocolError::from),
            None => Err(ProtocolError::MissingData),
        }
    }
}

/// Body of the `{pong: true}` response to `ping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongPayload {
    pub pong: bool,
}

impl Default for PongPayload {
    fn default() -> Self {
        Self { pong: true }
    }
}

/// Body of the `{ready: true}` response to `ready_probe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyPayload {
    pub ready: bool,
}

/// Body of the response to `exec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResultPayload {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_omits_error_field_on_serialize() {
        let id = Uuid::new_v4();
        let resp = Response::ok(id, &PongPayload::default()).unwrap();
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["status"], "ok");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn error_response_omits_data_field_on_serialize() {
        let id = Uuid::new_v4();
        let resp = Response::error(id, 404, "not found");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["status"], "error");
        assert!(value.get("data").is_none());
        assert_eq!(value["error"]["code"], 404);
    }

    #[test]
    fn data_as_decodes_typed_payload() {
        let id = Uuid::new_v4();
        let resp = Response::ok(id, &ExecResultPayload {
            exit_code: 0,
            stdout: "hi".to_string(),
            stderr: String::new(),
        })
        .unwrap();
        let decoded: ExecResultPayload = resp.data_as().unwrap();
        assert_eq!(decoded.exit_code, 0);
        assert_eq!(decoded.stdout, "hi");
    }
}
