//! Parent↔worker wire framing.
//!
//! Every frame is a fixed 5-byte header followed by a JSON payload:
//!
//! ```text
//! +---------+----------------------+------------------+
//! | version |   payload length     |   JSON payload    |
//! |  1 byte |  4 bytes (BE, u32)   |  `length` bytes    |
//! +---------+----------------------+------------------+
//! ```
//!
//! The version byte lets either side reject a peer speaking a
//! different protocol generation before it wastes time parsing JSON it
//! doesn't understand.

use crate::error::{ProtocolError, Result};
use crate::types::{EventEnvelope, ExecutionRequest, OperationRecord};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use pcore_ids::ExecutionId;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const WIRE_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 5;
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Messages a worker sends to its parent pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Ready {
        pid: u32,
    },
    Progress {
        execution_id: ExecutionId,
        operation: OperationRecord,
    },
    Event {
        execution_id: ExecutionId,
        envelope: EventEnvelope,
    },
    Result {
        execution_id: ExecutionId,
        output: serde_json::Value,
        operations: Vec<OperationRecord>,
        execution_time_ms: u64,
    },
    Error {
        execution_id: ExecutionId,
        message: String,
        code: String,
    },
    Health {
        healthy: bool,
        requests_served: u64,
        uptime_ms: u64,
    },
}

/// Messages a parent pool sends to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    Execute {
        request: Box<ExecutionRequest>,
    },
    Abort {
        execution_id: ExecutionId,
    },
    HealthCheck,
    Shutdown {
        grace_ms: u64,
    },
}

fn encode_header(buf: &mut Vec<u8>, payload_len: usize) -> Result<()> {
    if payload_len > MAX_FRAME_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            size: payload_len,
            max: MAX_FRAME_LEN,
        });
    }
    buf.write_u8(WIRE_VERSION)?;
    buf.write_u32::<BigEndian>(payload_len as u32)?;
    Ok(())
}

fn decode_header(header: &[u8]) -> Result<usize> {
    if header.len() < HEADER_LEN {
        return Err(ProtocolError::HeaderTooShort {
            expected: HEADER_LEN,
            got: header.len(),
        });
    }
    let mut cursor = header;
    let version = cursor.read_u8()?;
    if version != WIRE_VERSION {
        return Err(ProtocolError::VersionMismatch {
            expected: WIRE_VERSION,
            got: version,
        });
    }
    let len = cursor.read_u32::<BigEndian>()? as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            size: len,
            max: MAX_FRAME_LEN,
        });
    }
    Ok(len)
}

/// Serialise a message to a single length-prefixed frame.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(message)?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    encode_header(&mut frame, payload.len())?;
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Write a message as a single frame to a blocking sink (used by the
/// worker's stdio loop, which runs on its own thread).
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let frame = encode_frame(message)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Read a single frame from a blocking source and decode it.
pub fn read_frame<R: Read, T: for<'de> Deserialize<'de>>(reader: &mut R) -> Result<T> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header)?;
    let len = decode_header(&header)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    if payload.len() != len {
        return Err(ProtocolError::PayloadLengthMismatch {
            expected: len,
            got: payload.len(),
        });
    }
    Ok(serde_json::from_slice(&payload)?)
}

/// Async counterpart of [`write_frame`], used by the pool backend
/// talking to a worker's stdio pipes over `tokio::process`.
pub async fn write_frame_async<W: AsyncWrite + Unpin, T: Serialize>(
    writer: &mut W,
    message: &T,
) -> Result<()> {
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Async counterpart of [`read_frame`].
pub async fn read_frame_async<R: AsyncRead + Unpin, T: for<'de> Deserialize<'de>>(
    reader: &mut R,
) -> Result<T> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let len = decode_header(&header)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(serde_json::from_slice(&payload)?)
}
