// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Frame Codec
//!
//! Length-framed JSON over a bidirectional byte stream: a big-endian
//! `u32` length followed by the JSON document. Every read and write is
//! bounded by a 30-second deadline; hitting it is a typed timeout, a
//! malformed frame is a protocol error.
//!
//! Key exchange additionally accepts a bare PEM block with no length
//! prefix (the original wire format for keys): the reader accumulates
//! into a growing buffer and attempts a parse after every read, stopping
//! on the first successful decode.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use chunk_vault_domain::VaultError;

/// Per-read and per-write deadline on every exchange.
pub const IO_DEADLINE: Duration = Duration::from_secs(30);

/// Upper bound on a single frame. Chunk bodies travel base64-encoded,
/// so this comfortably covers the largest configurable chunk.
pub const MAX_FRAME_SIZE: usize = 256 * 1024 * 1024;

/// PEM blocks have no length prefix; cap their accumulation buffer.
const MAX_PEM_SIZE: usize = 64 * 1024;

/// First bytes of a PEM block (`----`), used to tell a bare PEM apart
/// from a length prefix. As a length it would exceed [`MAX_FRAME_SIZE`],
/// so the two framings cannot collide.
pub const PEM_MARKER: [u8; 4] = *b"----";

async fn deadline<T>(
    operation: &str,
    fut: impl std::future::Future<Output = std::io::Result<T>>,
) -> Result<T, VaultError> {
    match tokio::time::timeout(IO_DEADLINE, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => Err(
            VaultError::ProtocolError(format!("{}: stream closed mid-frame", operation)),
        ),
        Ok(Err(err)) => Err(VaultError::io_error(format!("{}: {}", operation, err))),
        Err(_) => Err(VaultError::TimeoutError(format!(
            "{} exceeded the {}s deadline",
            operation,
            IO_DEADLINE.as_secs()
        ))),
    }
}

/// Writes one JSON frame.
pub async fn write_frame<S, T>(stream: &mut S, message: &T) -> Result<(), VaultError>
where
    S: AsyncWrite + Unpin + Send + ?Sized,
    T: Serialize,
{
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(VaultError::ProtocolError(format!(
            "outgoing frame of {} bytes exceeds the {} byte limit",
            body.len(),
            MAX_FRAME_SIZE
        )));
    }
    let len = (body.len() as u32).to_be_bytes();
    deadline("frame write", async {
        stream.write_all(&len).await?;
        stream.write_all(&body).await?;
        stream.flush().await
    })
    .await
}

/// Reads one JSON frame.
pub async fn read_frame<S, T>(stream: &mut S) -> Result<T, VaultError>
where
    S: AsyncRead + Unpin + Send + ?Sized,
    T: DeserializeOwned,
{
    let mut len_bytes = [0u8; 4];
    deadline("frame read", stream.read_exact(&mut len_bytes)).await?;
    decode_frame_body(stream, len_bytes).await
}

/// Reads the body of a frame whose length prefix was already consumed.
pub async fn decode_frame_body<S, T>(stream: &mut S, len_bytes: [u8; 4]) -> Result<T, VaultError>
where
    S: AsyncRead + Unpin + Send + ?Sized,
    T: DeserializeOwned,
{
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(VaultError::ProtocolError(format!(
            "incoming frame of {} bytes exceeds the {} byte limit",
            len, MAX_FRAME_SIZE
        )));
    }
    let mut body = vec![0u8; len];
    deadline("frame read", stream.read_exact(&mut body)).await?;
    serde_json::from_slice(&body)
        .map_err(|e| VaultError::ProtocolError(format!("malformed frame: {}", e)))
}

/// Writes the protocol-id preamble that opens every logical stream.
pub async fn write_protocol_id<S>(stream: &mut S, protocol_id: &str) -> Result<(), VaultError>
where
    S: AsyncWrite + Unpin + Send + ?Sized,
{
    let bytes = protocol_id.as_bytes();
    if bytes.is_empty() || bytes.len() > u8::MAX as usize {
        return Err(VaultError::ProtocolError(format!(
            "protocol id {:?} has an unusable length",
            protocol_id
        )));
    }
    deadline("protocol preamble write", async {
        stream.write_all(&[bytes.len() as u8]).await?;
        stream.write_all(bytes).await?;
        stream.flush().await
    })
    .await
}

/// Reads the protocol-id preamble.
pub async fn read_protocol_id<S>(stream: &mut S) -> Result<String, VaultError>
where
    S: AsyncRead + Unpin + Send + ?Sized,
{
    let mut len = [0u8; 1];
    deadline("protocol preamble read", stream.read_exact(&mut len)).await?;
    let mut bytes = vec![0u8; len[0] as usize];
    deadline("protocol preamble read", stream.read_exact(&mut bytes)).await?;
    String::from_utf8(bytes)
        .map_err(|_| VaultError::ProtocolError("protocol id is not UTF-8".to_string()))
}

/// Accumulates a bare PEM block of unknown length, attempting a parse
/// after each read and stopping on the first successful decode.
///
/// `preload` carries bytes already consumed while sniffing the framing.
pub async fn read_pem_block<S, T, F>(
    stream: &mut S,
    preload: &[u8],
    mut try_parse: F,
) -> Result<T, VaultError>
where
    S: AsyncRead + Unpin + Send + ?Sized,
    F: FnMut(&str) -> Option<T>,
{
    let mut buffer = preload.to_vec();
    loop {
        if let Ok(text) = std::str::from_utf8(&buffer) {
            if let Some(parsed) = try_parse(text) {
                return Ok(parsed);
            }
        }
        if buffer.len() >= MAX_PEM_SIZE {
            return Err(VaultError::ProtocolError(
                "PEM block exceeds the size limit without parsing".to_string(),
            ));
        }
        let mut chunk = [0u8; 256];
        let n = deadline("PEM read", stream.read(&mut chunk)).await?;
        if n == 0 {
            return Err(VaultError::ProtocolError(
                "stream ended before a PEM block could be parsed".to_string(),
            ));
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
}
