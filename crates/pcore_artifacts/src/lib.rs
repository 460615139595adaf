//! Artifact broker (C3): addresses artifacts by URI, enforces the
//! caller's `artifacts.read`/`artifacts.write` permissions, and
//! publishes atomically via temp-write-then-rename.

mod broker;
mod error;
mod permissions;
mod uri;

pub use broker::{ArtifactBroker, WriteOptions, WriteOutcome};
pub use error::{ArtifactError, ArtifactResult};
pub use permissions::{check_artifact_read, check_artifact_write};
pub use uri::ArtifactUri;
