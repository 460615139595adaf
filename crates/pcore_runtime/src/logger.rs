//! Structured logger handed to handlers. Wraps `tracing` so output
//! lands in the same rolling-file sink as the rest of the host, while
//! carrying the fixed `requestId/traceId/spanId/pluginId` fields every
//! log line from a handler should have.

use pcore_ids::{PluginId, RequestId, SpanId, TraceId};
use serde_json::Value;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone)]
pub struct Logger {
    request_id: RequestId,
    trace_id: TraceId,
    span_id: SpanId,
    plugin_id: PluginId,
    extra_fields: Vec<(String, Value)>,
}

impl Logger {
    pub fn new(request_id: RequestId, trace_id: TraceId, span_id: SpanId, plugin_id: PluginId) -> Self {
        Self { request_id, trace_id, span_id, plugin_id, extra_fields: Vec::new() }
    }

    /// Return a logger carrying the same identifiers plus additional
    /// fields — used by handlers to scope log lines to a sub-operation
    /// without losing the execution's identity.
    pub fn child(&self, fields: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut extra_fields = self.extra_fields.clone();
        extra_fields.extend(fields);
        Self { extra_fields, ..self.clone() }
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let fields_json = serde_json::to_string(
            &self.extra_fields.iter().cloned().collect::<serde_json::Map<_, _>>(),
        )
        .unwrap_or_default();

        match level {
            LogLevel::Debug => debug!(
                request_id = %self.request_id, trace_id = %self.trace_id, span_id = %self.span_id,
                plugin_id = %self.plugin_id, fields = %fields_json, "{message}"
            ),
            LogLevel::Info => info!(
                request_id = %self.request_id, trace_id = %self.trace_id, span_id = %self.span_id,
                plugin_id = %self.plugin_id, fields = %fields_json, "{message}"
            ),
            LogLevel::Warn => warn!(
                request_id = %self.request_id, trace_id = %self.trace_id, span_id = %self.span_id,
                plugin_id = %self.plugin_id, fields = %fields_json, "{message}"
            ),
            LogLevel::Error => error!(
                request_id = %self.request_id, trace_id = %self.trace_id, span_id = %self.span_id,
                plugin_id = %self.plugin_id, fields = %fields_json, "{message}"
            ),
        }
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message)
    }
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message)
    }
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message)
    }
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger() -> Logger {
        Logger::new(
            RequestId::new(),
            TraceId::new(),
            SpanId::new(),
            PluginId::from("acme/formatter"),
        )
    }

    #[test]
    fn child_inherits_identifiers_and_adds_fields() {
        let base = logger();
        let child = base.child(vec![("op".to_string(), Value::String("parse".to_string()))]);
        assert_eq!(child.request_id, base.request_id);
        assert_eq!(child.extra_fields.len(), 1);
    }

    #[test]
    fn logging_does_not_panic() {
        let log = logger();
        log.info("hello");
        log.warn("careful");
        log.error("boom");
    }
}
