//! Shared wire format and data model for the plugin execution core.
//!
//! This crate has no knowledge of permission enforcement, process
//! management, or storage — it is the common vocabulary that every
//! other component (runtime facade, worker, pool, dispatcher) speaks
//! so they can exchange requests, results, and events without
//! depending on each other directly.

pub mod error;
pub mod types;
pub mod wire;

pub use error::{ProtocolError, Result};
pub use types::*;
pub use wire::{
    encode_frame, read_frame, read_frame_async, write_frame, write_frame_async, HostMessage,
    WorkerMessage, HEADER_LEN, MAX_FRAME_LEN, WIRE_VERSION,
};
