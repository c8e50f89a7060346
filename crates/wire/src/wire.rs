// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format: 4-byte big-endian length prefix + JSON payload, used by the
//! local Unix-domain-socket IPC transport. The WebSocket transport reuses the
//! same [`encode`]/[`decode`] pair but frames with WS text frames instead.

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ProtocolError;

/// Serializes `value` to raw JSON bytes (no length prefix).
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

/// Deserializes raw JSON bytes (no length prefix) into `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Writes `data` prefixed with its length as a 4-byte big-endian `u32`.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> std::io::Result<()> {
    writer.write_u32(data.len() as u32).await?;
    writer.write_all(data).await
}

/// Reads a 4-byte big-endian length prefix followed by that many bytes.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let len = reader.read_u32().await? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Encodes `request` and writes it length-prefixed.
pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    request: &crate::Request,
) -> Result<(), ProtocolError> {
    let bytes = encode(request)?;
    write_message(writer, &bytes).await?;
    Ok(())
}

/// Reads a length-prefixed frame and decodes it as a [`crate::Request`].
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<crate::Request, ProtocolError> {
    let bytes = read_message(reader).await?;
    decode(&bytes)
}

/// Encodes `response` and writes it length-prefixed.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &crate::Response,
) -> Result<(), ProtocolError> {
    let bytes = encode(response)?;
    write_message(writer, &bytes).await?;
    Ok(())
}

/// Reads a length-prefixed frame and decodes it as a [`crate::Response`].
pub async fn read_response<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<crate::Response, ProtocolError> {
    let bytes = read_message(reader).await?;
    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Response, ResponseStatus};
    use uuid::Uuid;

    #[test]
    fn encode_returns_json_without_length_prefix() {
        let response = Response::ok_empty(Uuid::new_v4());
        let encoded = encode(&response).expect("encode failed");
        let json_str = std::str::from_utf8(&encoded).expect("should be valid UTF-8");
        assert!(json_str.starts_with('{'), "should be JSON object: {json_str}");
    }

    #[tokio::test]
    async fn read_write_message_roundtrip() {
        let original = b"hello world";
        let mut buffer = Vec::new();
        write_message(&mut buffer, original).await.expect("write failed");
        assert_eq!(buffer.len(), 4 + original.len());

        let mut cursor = std::io::Cursor::new(buffer);
        let read_back = read_message(&mut cursor).await.expect("read failed");
        assert_eq!(read_back, original);
    }

    #[tokio::test]
    async fn write_message_adds_big_endian_length_prefix() {
        let data = b"test data";
        let mut buffer = Vec::new();
        write_message(&mut buffer, data).await.expect("write failed");

        let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
        assert_eq!(len, data.len());
        assert_eq!(&buffer[4..], data);
    }

    #[tokio::test]
    async fn write_then_read_response_roundtrips() {
        let mut buffer = Vec::new();
        let response = Response::ok_empty(Uuid::new_v4());
        write_response(&mut buffer, &response).await.unwrap();

        let mut cursor = std::io::Cursor::new(buffer);
        let decoded = read_response(&mut cursor).await.unwrap();
        assert_eq!(decoded.id, response.id);
        assert_eq!(decoded.status, ResponseStatus::Ok);
    }
}
