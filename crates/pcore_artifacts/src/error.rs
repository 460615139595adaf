use pcore_errors::{ErrorCode, ErrorEnvelope};
use std::io;
use thiserror::Error;

pub type ArtifactResult<T> = std::result::Result<T, ArtifactError>;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("invalid artifact URI: {0}")]
    InvalidUri(String),

    #[error("artifact read denied: {0}")]
    ReadDenied(String),

    #[error("artifact write denied: {0}")]
    WriteDenied(String),

    #[error("artifact already exists: {0}")]
    Conflict(String),

    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("artifact expired: {0}")]
    Expired(String),

    #[error("artifact publish failed: {0}")]
    Failed(String),

    #[error("timed out waiting for artifact: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ArtifactError {
    pub fn into_envelope(self) -> ErrorEnvelope {
        let (code, message) = match &self {
            ArtifactError::InvalidUri(m) => (ErrorCode::InvalidUri, m.clone()),
            ArtifactError::ReadDenied(m) => (ErrorCode::ArtifactReadDenied, m.clone()),
            ArtifactError::WriteDenied(m) => (ErrorCode::ArtifactWriteDenied, m.clone()),
            ArtifactError::Conflict(m) => (ErrorCode::Conflict, m.clone()),
            ArtifactError::NotFound(m) => (ErrorCode::NotFound, m.clone()),
            ArtifactError::Expired(m) => (ErrorCode::NotFound, format!("expired: {m}")),
            ArtifactError::Failed(m) => (ErrorCode::Internal, m.clone()),
            ArtifactError::Timeout(m) => (ErrorCode::Timeout, m.clone()),
            ArtifactError::Io(e) => (ErrorCode::Internal, e.to_string()),
            ArtifactError::Json(e) => (ErrorCode::Internal, e.to_string()),
        };
        ErrorEnvelope::builder(code, message).build()
    }
}
