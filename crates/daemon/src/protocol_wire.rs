// SPDX-License-Identifier: MIT

//! Wire framing shared by every request/response on the daemon socket:
//! a 4-byte big-endian length prefix followed by a JSON payload. Grounded
//! on the donor codebase's own `protocol_wire.rs` — same framing, same
//! size cap, generalized from its job-protocol payloads to this daemon's
//! `Request`/`Response` types.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single framed message, guarding against unbounded
/// allocation from a hostile or buggy client.
pub const MAX_MESSAGE_SIZE: u32 = 64 * 1024 * 1024;

/// Default per-request read/write deadline applied by the listener.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Identifies the wire format a client was built against; bumped whenever
/// the protocol changes incompatibly. Exposed to `sim status` so a
/// mismatched client/daemon pair is diagnosable.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message of {size} bytes exceeds the {max} byte limit")]
    MessageTooLarge { size: u32, max: u32 },
    #[error("connection closed")]
    ConnectionClosed,
    #[error("timed out waiting for message")]
    Timeout,
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Reads one length-prefixed message, failing closed on an oversized
/// length prefix before ever allocating the buffer for it.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(err) => return Err(err.into()),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> Result<(), ProtocolError> {
    if body.len() as u64 > MAX_MESSAGE_SIZE as u64 {
        return Err(ProtocolError::MessageTooLarge {
            size: body.len() as u32,
            max: MAX_MESSAGE_SIZE,
        });
    }
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_request<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let body = tokio::time::timeout(DEFAULT_TIMEOUT, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&body)
}

pub async fn write_response<W, T>(writer: &mut W, value: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = encode(value)?;
    write_message(writer, &body).await
}
