//! Protocol-level errors: framing and (de)serialisation failures only.
//!
//! Higher-level failures (permission denials, handler errors, quota
//! violations) are represented by `pcore_errors::ErrorEnvelope`, not
//! here — this crate only knows about bytes on the wire.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("frame header too short: expected {expected} bytes, got {got}")]
    HeaderTooShort { expected: usize, got: usize },

    #[error("protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u8, got: u8 },

    #[error("frame payload exceeds maximum size: {size} > {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("payload length mismatch: header said {expected} bytes, got {got}")]
    PayloadLengthMismatch { expected: usize, got: usize },

    #[error("unknown message discriminator: {0}")]
    UnknownDiscriminator(String),

    #[error("JSON serialisation error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
