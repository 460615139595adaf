//! Errors the worker-pool backend can hand back to a dispatcher.

use pcore_errors::{ErrorCode, ErrorEnvelope};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool is draining and cannot admit new executions")]
    NotAvailable,

    #[error("execution did not complete within its deadline")]
    Timeout,

    #[error("worker exited before returning a result")]
    WorkerCrashed,

    #[error("failed to spawn worker process: {0}")]
    SpawnFailed(String),

    #[error("{message}")]
    Handler { code: ErrorCode, message: String },
}

impl PoolError {
    /// Turn this into the structured envelope a dispatcher hands back
    /// to its caller. Worker-reported handler errors already carry
    /// their own code; everything else maps to a code that describes
    /// the pool's own failure to deliver a result.
    pub fn into_envelope(self) -> ErrorEnvelope {
        match self {
            PoolError::NotAvailable => {
                ErrorEnvelope::builder(ErrorCode::NotAvailable, "worker pool has no capacity").build()
            }
            PoolError::Timeout => {
                ErrorEnvelope::builder(ErrorCode::Timeout, "execution deadline exceeded").build()
            }
            PoolError::WorkerCrashed => {
                ErrorEnvelope::builder(ErrorCode::WorkerCrashed, "worker exited unexpectedly").build()
            }
            PoolError::SpawnFailed(reason) => {
                ErrorEnvelope::builder(ErrorCode::Internal, format!("could not start worker: {reason}")).build()
            }
            PoolError::Handler { code, message } => ErrorEnvelope::builder(code, message).build(),
        }
    }
}

/// Parse the wire `code` string a worker reports back into our own
/// taxonomy, falling back to `Internal` for anything unrecognised
/// (e.g. a worker built against a newer error taxonomy than this pool
/// knows about).
pub fn parse_error_code(code: &str) -> ErrorCode {
    match code {
        "PermissionDenied" => ErrorCode::PermissionDenied,
        "CapabilityMissing" => ErrorCode::CapabilityMissing,
        "PathTraversal" => ErrorCode::PathTraversal,
        "InvalidUri" => ErrorCode::InvalidUri,
        "Conflict" => ErrorCode::Conflict,
        "NotFound" => ErrorCode::NotFound,
        "HandlerNotFound" => ErrorCode::HandlerNotFound,
        "SchemaValidationFailed" => ErrorCode::SchemaValidationFailed,
        "Timeout" => ErrorCode::Timeout,
        "Cancelled" => ErrorCode::Cancelled,
        "QuotaExceeded" => ErrorCode::QuotaExceeded,
        "PayloadTooLarge" => ErrorCode::PayloadTooLarge,
        "ListenerLimit" => ErrorCode::ListenerLimit,
        "RateLimited" => ErrorCode::RateLimited,
        "DuplicateDropped" => ErrorCode::DuplicateDropped,
        "WorkerCrashed" => ErrorCode::WorkerCrashed,
        "NotImplemented" => ErrorCode::NotImplemented,
        "ArtifactReadDenied" => ErrorCode::ArtifactReadDenied,
        "ArtifactWriteDenied" => ErrorCode::ArtifactWriteDenied,
        "NotAvailable" => ErrorCode::NotAvailable,
        "UnknownMode" => ErrorCode::UnknownMode,
        _ => ErrorCode::Internal,
    }
}
