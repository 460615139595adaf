use pcore_errors::{ErrorCode, ErrorEnvelope};
use pcore_permissions::GateDecision;
use std::io;
use thiserror::Error;

pub type FacadeResult<T> = std::result::Result<T, FacadeError>;

#[derive(Error, Debug)]
pub enum FacadeError {
    #[error("permission denied: {}", .0.reason.as_deref().unwrap_or("no reason given"))]
    PermissionDenied(GateDecision),

    #[error("path traversal: '{0}' resolves outside the sandboxed base directory")]
    PathTraversal(String),

    #[error("env key '{0}' is not whitelisted")]
    EnvNotWhitelisted(String),

    #[error("net host '{0}' is not permitted")]
    NetDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl FacadeError {
    pub fn into_envelope(self) -> ErrorEnvelope {
        match self {
            FacadeError::PermissionDenied(decision) => {
                let mut builder = ErrorEnvelope::builder(
                    ErrorCode::PermissionDenied,
                    decision.reason.clone().unwrap_or_else(|| "permission denied".into()),
                );
                if let Some(remediation) = decision.remediation {
                    builder = builder.fix(remediation);
                }
                builder.build()
            }
            FacadeError::PathTraversal(path) => ErrorEnvelope::builder(
                ErrorCode::PathTraversal,
                format!("path '{path}' escapes the sandboxed base directory"),
            )
            .fix("use a path relative to the working/output directory without '..' segments")
            .build(),
            FacadeError::EnvNotWhitelisted(key) => ErrorEnvelope::builder(
                ErrorCode::PermissionDenied,
                format!("env key '{key}' is not whitelisted"),
            )
            .build(),
            FacadeError::NetDenied(host) => ErrorEnvelope::builder(
                ErrorCode::PermissionDenied,
                format!("host '{host}' is not permitted"),
            )
            .build(),
            FacadeError::Io(err) => {
                ErrorEnvelope::builder(ErrorCode::Internal, err.to_string()).build()
            }
            FacadeError::Http(err) => {
                ErrorEnvelope::builder(ErrorCode::Internal, err.to_string()).build()
            }
        }
    }
}
