//! The structured error envelope every execution failure is reported
//! through (C8), plus a bounded root-cause inspector.
//!
//! Every error that crosses a component boundary — permission denial,
//! handler exception, timeout, quota breach — ends up as an
//! [`ErrorEnvelope`] rather than a bare `anyhow::Error`, so that the
//! dispatcher can answer "what code, what HTTP status, what do I tell
//! the caller" the same way regardless of which component raised it.

use pcore_ids::{PluginId, RequestId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod root_cause;

pub use root_cause::{inspect_root_cause, RootCause};

/// The error taxonomy from the error-handling design: every code the
/// envelope can carry, independent of where it originated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorCode {
    PermissionDenied,
    CapabilityMissing,
    PathTraversal,
    InvalidUri,
    Conflict,
    NotFound,
    HandlerNotFound,
    SchemaValidationFailed,
    Timeout,
    Cancelled,
    QuotaExceeded,
    PayloadTooLarge,
    ListenerLimit,
    RateLimited,
    /// Observable only via analytics per the propagation policy — never
    /// surfaced as a user-facing failure on its own.
    DuplicateDropped,
    WorkerCrashed,
    NotImplemented,
    ArtifactReadDenied,
    ArtifactWriteDenied,
    /// The worker-pool backend is draining or otherwise has no
    /// capacity to admit a new execution right now.
    NotAvailable,
    /// An execution-mode string (explicit or from `EXECUTION_MODE`)
    /// didn't match any backend mode (§6 "Backend selection").
    UnknownMode,
    Internal,
}

impl ErrorCode {
    /// The wire/JSON spelling of this code (matches the `PascalCase`
    /// serde rename), for callers that need the code as a bare string
    /// without round-tripping through `serde_json`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::PermissionDenied => "PermissionDenied",
            ErrorCode::CapabilityMissing => "CapabilityMissing",
            ErrorCode::PathTraversal => "PathTraversal",
            ErrorCode::InvalidUri => "InvalidUri",
            ErrorCode::Conflict => "Conflict",
            ErrorCode::NotFound => "NotFound",
            ErrorCode::HandlerNotFound => "HandlerNotFound",
            ErrorCode::SchemaValidationFailed => "SchemaValidationFailed",
            ErrorCode::Timeout => "Timeout",
            ErrorCode::Cancelled => "Cancelled",
            ErrorCode::QuotaExceeded => "QuotaExceeded",
            ErrorCode::PayloadTooLarge => "PayloadTooLarge",
            ErrorCode::ListenerLimit => "ListenerLimit",
            ErrorCode::RateLimited => "RateLimited",
            ErrorCode::DuplicateDropped => "DuplicateDropped",
            ErrorCode::WorkerCrashed => "WorkerCrashed",
            ErrorCode::NotImplemented => "NotImplemented",
            ErrorCode::ArtifactReadDenied => "ArtifactReadDenied",
            ErrorCode::ArtifactWriteDenied => "ArtifactWriteDenied",
            ErrorCode::NotAvailable => "NotAvailable",
            ErrorCode::UnknownMode => "UnknownMode",
            ErrorCode::Internal => "Internal",
        }
    }

    /// Default HTTP status for this code, used when the caller doesn't
    /// override it.
    pub fn default_http_status(self) -> u16 {
        match self {
            ErrorCode::PermissionDenied => 403,
            ErrorCode::CapabilityMissing => 403,
            ErrorCode::ArtifactReadDenied => 403,
            ErrorCode::ArtifactWriteDenied => 403,
            ErrorCode::PathTraversal => 400,
            ErrorCode::InvalidUri => 400,
            ErrorCode::Conflict => 409,
            ErrorCode::NotFound => 404,
            ErrorCode::HandlerNotFound => 500,
            ErrorCode::SchemaValidationFailed => 422,
            ErrorCode::Timeout => 504,
            ErrorCode::Cancelled => 499,
            ErrorCode::QuotaExceeded => 429,
            ErrorCode::PayloadTooLarge => 413,
            ErrorCode::ListenerLimit => 429,
            ErrorCode::RateLimited => 429,
            ErrorCode::DuplicateDropped => 200,
            ErrorCode::WorkerCrashed => 500,
            ErrorCode::NotImplemented => 501,
            ErrorCode::NotAvailable => 503,
            ErrorCode::UnknownMode => 400,
            ErrorCode::Internal => 500,
        }
    }
}

/// Execution metadata attached to every envelope, for observability
/// and billing regardless of what failed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorMeta {
    pub request_id: Option<RequestId>,
    pub plugin_id: Option<PluginId>,
    pub plugin_version: Option<String>,
    pub route_or_command: Option<String>,
    pub time_ms: Option<u64>,
    pub cpu_ms: Option<u64>,
    pub mem_mb: Option<u64>,
    pub perms: Option<serde_json::Value>,
}

/// Structured failure with context, remediation, and sanitisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    pub http_status: u16,
    pub message: String,
    pub details: HashMap<String, serde_json::Value>,
    pub trace: Option<String>,
    pub root_cause: Option<RootCause>,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub fixes: Vec<String>,
    pub documentation: Option<String>,
    pub meta: ErrorMeta,
}

/// Detail keys whose lower-case form contains one of these substrings
/// are redacted before the envelope leaves the process.
const SENSITIVE_SUBSTRINGS: &[&str] = &["password", "secret", "token", "key", "apikey", "auth"];

fn sanitise_details(
    details: HashMap<String, serde_json::Value>,
) -> HashMap<String, serde_json::Value> {
    details
        .into_iter()
        .map(|(k, v)| {
            let lower = k.to_lowercase();
            if SENSITIVE_SUBSTRINGS.iter().any(|needle| lower.contains(needle)) {
                (k, serde_json::Value::String("[REDACTED]".to_string()))
            } else {
                (k, v)
            }
        })
        .collect()
}

impl ErrorEnvelope {
    pub fn builder(code: ErrorCode, message: impl Into<String>) -> ErrorEnvelopeBuilder {
        ErrorEnvelopeBuilder::new(code, message)
    }

    /// Exit code an embedding CLI should use when this envelope is the
    /// reason a command failed. Follows common shell conventions
    /// (`124` for timeout, `130` for an interrupted/cancelled run)
    /// rather than inventing a bespoke scheme.
    pub fn cli_exit_code(&self) -> i32 {
        match self.code {
            ErrorCode::Timeout => 124,
            ErrorCode::Cancelled => 130,
            ErrorCode::NotImplemented => 69,
            ErrorCode::NotAvailable => 69,
            _ => 1,
        }
    }
}

/// Builder mirroring the fluent style used elsewhere for helpful,
/// user-facing errors: build up context and suggestions, then finish.
pub struct ErrorEnvelopeBuilder {
    code: ErrorCode,
    http_status: Option<u16>,
    message: String,
    details: HashMap<String, serde_json::Value>,
    trace: Option<String>,
    root_cause: Option<RootCause>,
    context: Option<String>,
    suggestions: Vec<String>,
    fixes: Vec<String>,
    documentation: Option<String>,
    meta: ErrorMeta,
}

impl ErrorEnvelopeBuilder {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            http_status: None,
            message: message.into(),
            details: HashMap::new(),
            trace: None,
            root_cause: None,
            context: None,
            suggestions: Vec::new(),
            fixes: Vec::new(),
            documentation: None,
            meta: ErrorMeta::default(),
        }
    }

    pub fn http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.details.insert(key.into(), value);
        }
        self
    }

    pub fn trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    pub fn documentation(mut self, doc: impl Into<String>) -> Self {
        self.documentation = Some(doc.into());
        self
    }

    pub fn meta(mut self, meta: ErrorMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Run the bounded root-cause inspector over the message/trace and
    /// attach its verdict. Only call this when debug mode is enabled —
    /// it is never run on hot paths by default.
    pub fn with_root_cause_inspection(mut self) -> Self {
        self.root_cause = inspect_root_cause(&self.message, self.trace.as_deref());
        self
    }

    pub fn build(self) -> ErrorEnvelope {
        ErrorEnvelope {
            http_status: self.http_status.unwrap_or_else(|| self.code.default_http_status()),
            code: self.code,
            message: self.message,
            details: sanitise_details(self.details),
            trace: self.trace,
            root_cause: self.root_cause,
            context: self.context,
            suggestions: self.suggestions,
            fixes: self.fixes,
            documentation: self.documentation,
            meta: self.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_http_status_matches_taxonomy() {
        assert_eq!(ErrorCode::PermissionDenied.default_http_status(), 403);
        assert_eq!(ErrorCode::SchemaValidationFailed.default_http_status(), 422);
        assert_eq!(ErrorCode::QuotaExceeded.default_http_status(), 429);
        assert_eq!(ErrorCode::Timeout.default_http_status(), 504);
    }

    #[test]
    fn builder_redacts_sensitive_detail_keys() {
        let envelope = ErrorEnvelope::builder(ErrorCode::Internal, "boom")
            .detail("apiKey", "sk-live-12345")
            .detail("path", "/tmp/out.json")
            .build();
        assert_eq!(
            envelope.details.get("apiKey").unwrap(),
            &serde_json::Value::String("[REDACTED]".to_string())
        );
        assert_eq!(
            envelope.details.get("path").unwrap(),
            &serde_json::Value::String("/tmp/out.json".to_string())
        );
    }

    #[test]
    fn builder_defaults_http_status_from_code() {
        let envelope = ErrorEnvelope::builder(ErrorCode::Conflict, "already exists").build();
        assert_eq!(envelope.http_status, 409);
    }

    #[test]
    fn explicit_http_status_overrides_default() {
        let envelope = ErrorEnvelope::builder(ErrorCode::Internal, "boom")
            .http_status(599)
            .build();
        assert_eq!(envelope.http_status, 599);
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let envelope = ErrorEnvelope::builder(ErrorCode::NotFound, "missing artifact")
            .suggestion("check the artifact id")
            .build();
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: ErrorEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.code, ErrorCode::NotFound);
        assert_eq!(parsed.suggestions, vec!["check the artifact id".to_string()]);
    }
}
