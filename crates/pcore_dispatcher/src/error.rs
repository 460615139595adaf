//! Errors the dispatch pipeline and its backends can produce, unified
//! into the same [`ErrorEnvelope`] every other component reports
//! failures through.

use pcore_errors::{ErrorCode, ErrorEnvelope};
use pcore_pool::PoolError;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("required capabilities not granted: {0:?}")]
    CapabilityMissing(Vec<String>),

    #[error("input failed schema validation: {0}")]
    InputSchemaInvalid(String),

    #[error("output failed schema validation: {0}")]
    OutputSchemaInvalid(String),

    #[error("Remote execution backend not yet implemented")]
    NotImplemented,

    #[error(transparent)]
    Backend(#[from] PoolError),
}

impl DispatchError {
    pub fn into_envelope(self) -> ErrorEnvelope {
        match self {
            DispatchError::CapabilityMissing(missing) => ErrorEnvelope::builder(
                ErrorCode::CapabilityMissing,
                format!("missing required capabilities: {}", missing.join(", ")),
            )
            .detail("missing", missing)
            .fix("grant the listed capabilities in the request's permissions, or drop them from the manifest")
            .build(),
            DispatchError::InputSchemaInvalid(message) => {
                ErrorEnvelope::builder(ErrorCode::SchemaValidationFailed, format!("input validation failed: {message}"))
                    .detail("target", "input")
                    .build()
            }
            DispatchError::OutputSchemaInvalid(message) => {
                ErrorEnvelope::builder(ErrorCode::SchemaValidationFailed, format!("output validation failed: {message}"))
                    .detail("target", "output")
                    .build()
            }
            DispatchError::NotImplemented => {
                ErrorEnvelope::builder(ErrorCode::NotImplemented, "Remote execution backend not yet implemented").build()
            }
            DispatchError::Backend(pool_error) => pool_error.into_envelope(),
        }
    }
}

impl From<DispatchError> for ErrorEnvelope {
    fn from(err: DispatchError) -> Self {
        err.into_envelope()
    }
}
