use pcore_errors::{ErrorCode, ErrorEnvelope};
use thiserror::Error;

pub type EventBusResult<T> = std::result::Result<T, EventBusError>;

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("event permission denied: {0}")]
    PermissionDenied(String),

    #[error("event payload exceeds maxPayloadBytes: {size} > {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("eventsPerMinute quota exceeded for this scope")]
    QuotaExceeded,

    #[error("maxListenersPerTopic exceeded for topic '{0}'")]
    ListenerLimit(String),

    #[error("timed out waiting for topic '{0}'")]
    Timeout(String),

    #[error("event bus is draining/shut down")]
    ShuttingDown,
}

impl EventBusError {
    pub fn into_envelope(self) -> ErrorEnvelope {
        let (code, message) = match &self {
            EventBusError::PermissionDenied(m) => (ErrorCode::PermissionDenied, m.clone()),
            EventBusError::PayloadTooLarge { .. } => (ErrorCode::PayloadTooLarge, self.to_string()),
            EventBusError::QuotaExceeded => (ErrorCode::QuotaExceeded, self.to_string()),
            EventBusError::ListenerLimit(_) => (ErrorCode::ListenerLimit, self.to_string()),
            EventBusError::Timeout(_) => (ErrorCode::Timeout, self.to_string()),
            EventBusError::ShuttingDown => (ErrorCode::Internal, self.to_string()),
        };
        ErrorEnvelope::builder(code, message).build()
    }
}
