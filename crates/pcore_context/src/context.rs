//! Per-execution context: the bundle of identifiers, limits, and
//! cancellation plumbing handed to a runtime facade and, ultimately, a
//! handler.
//!
//! Built once by [`ExecutionContextBuilder`] and never mutated again —
//! the "deep freeze" the design calls for is simply that every field
//! here is either `Copy`, an immutable `String`/`PathBuf`, or an `Arc`
//! over something that is itself only ever appended-to through its own
//! interior-mutability discipline (the operation tracker, the
//! cancellation flag).

use crate::chain_state::ChainState;
use crate::tracker::OperationTracker;
use pcore_errors::{ErrorCode, ErrorEnvelope};
use pcore_ids::{PluginId, RequestId, SpanId, TraceId};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative cancellation flag shared between the dispatcher, the
/// pool's deadline timer, and the handler's own polling.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The minimum protocol version this build of the context builder
/// understands. Bumped whenever a field is added that older workers
/// can't interpret.
pub const CONTEXT_PROTOCOL_VERSION: u32 = 1;

pub struct ExecutionContext {
    pub request_id: RequestId,
    pub plugin_id: PluginId,
    pub plugin_version: String,
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub workdir: PathBuf,
    pub outdir: Option<PathBuf>,
    pub plugin_root: String,
    pub chain_state: ChainState,
    pub operations: Arc<OperationTracker>,
    pub signal: CancellationSignal,
    deadline: Instant,
}

impl ExecutionContext {
    /// `remainingMs (closure)`: milliseconds left until the deadline,
    /// saturating at zero rather than going negative once it's passed.
    pub fn remaining_ms(&self) -> u64 {
        self.deadline.saturating_duration_since(Instant::now()).as_millis() as u64
    }

    pub fn is_past_deadline(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

pub struct ExecutionContextBuilder {
    request_id: Option<RequestId>,
    plugin_id: Option<PluginId>,
    plugin_version: Option<String>,
    trace_id: Option<TraceId>,
    span_id: Option<SpanId>,
    parent_span_id: Option<SpanId>,
    workdir: Option<PathBuf>,
    outdir: Option<PathBuf>,
    plugin_root: Option<String>,
    chain_state: Option<ChainState>,
    timeout_ms: Option<u64>,
    protocol_version: u32,
}

impl Default for ExecutionContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContextBuilder {
    pub fn new() -> Self {
        Self {
            request_id: None,
            plugin_id: None,
            plugin_version: None,
            trace_id: None,
            span_id: None,
            parent_span_id: None,
            workdir: None,
            outdir: None,
            plugin_root: None,
            chain_state: None,
            timeout_ms: None,
            protocol_version: CONTEXT_PROTOCOL_VERSION,
        }
    }

    pub fn request_id(mut self, v: RequestId) -> Self {
        self.request_id = Some(v);
        self
    }
    pub fn plugin_id(mut self, v: PluginId) -> Self {
        self.plugin_id = Some(v);
        self
    }
    pub fn plugin_version(mut self, v: impl Into<String>) -> Self {
        self.plugin_version = Some(v.into());
        self
    }
    pub fn trace_id(mut self, v: TraceId) -> Self {
        self.trace_id = Some(v);
        self
    }
    pub fn span_id(mut self, v: SpanId) -> Self {
        self.span_id = Some(v);
        self
    }
    pub fn parent_span_id(mut self, v: Option<SpanId>) -> Self {
        self.parent_span_id = v;
        self
    }
    pub fn workdir(mut self, v: PathBuf) -> Self {
        self.workdir = Some(v);
        self
    }
    pub fn outdir(mut self, v: Option<PathBuf>) -> Self {
        self.outdir = v;
        self
    }
    pub fn plugin_root(mut self, v: impl Into<String>) -> Self {
        self.plugin_root = Some(v.into());
        self
    }
    pub fn chain_state(mut self, v: ChainState) -> Self {
        self.chain_state = Some(v);
        self
    }
    pub fn timeout_ms(mut self, v: u64) -> Self {
        self.timeout_ms = Some(v);
        self
    }
    /// Only used by tests exercising version rejection.
    pub fn protocol_version(mut self, v: u32) -> Self {
        self.protocol_version = v;
        self
    }

    /// Build the frozen context, or a `VersionMismatch`/`Internal`
    /// envelope describing what was missing.
    pub fn build(self) -> Result<(ExecutionContext, CancellationSignal), ErrorEnvelope> {
        if self.protocol_version > CONTEXT_PROTOCOL_VERSION {
            return Err(ErrorEnvelope::builder(
                ErrorCode::Internal,
                format!(
                    "unsupported context protocol version {} (this build understands up to {})",
                    self.protocol_version, CONTEXT_PROTOCOL_VERSION
                ),
            )
            .build());
        }

        let plugin_root = self.plugin_root.unwrap_or_default();
        if plugin_root.is_empty() {
            return Err(ErrorEnvelope::builder(
                ErrorCode::Internal,
                "execution context requires a non-empty pluginRoot",
            )
            .fix("set ExecutionRequest.plugin_root before dispatching")
            .build());
        }

        let request_id = self.request_id.unwrap_or_else(RequestId::new);
        let signal = CancellationSignal::new();
        let deadline = Instant::now() + Duration::from_millis(self.timeout_ms.unwrap_or(30_000));

        let context = ExecutionContext {
            request_id,
            plugin_id: self.plugin_id.unwrap_or_else(|| PluginId::from("")),
            plugin_version: self.plugin_version.unwrap_or_default(),
            trace_id: self.trace_id.unwrap_or_else(TraceId::new),
            span_id: self.span_id.unwrap_or_else(SpanId::new),
            parent_span_id: self.parent_span_id,
            workdir: self.workdir.unwrap_or_else(|| PathBuf::from(&plugin_root)),
            outdir: self.outdir,
            plugin_root,
            chain_state: self.chain_state.unwrap_or_else(|| ChainState::root(Default::default())),
            operations: Arc::new(OperationTracker::new()),
            signal: signal.clone(),
            deadline,
        };

        Ok((context, signal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_rejects_empty_plugin_root() {
        let err = ExecutionContextBuilder::new()
            .plugin_id(PluginId::from("acme/formatter"))
            .build()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Internal);
    }

    #[test]
    fn build_rejects_future_protocol_version() {
        let err = ExecutionContextBuilder::new()
            .plugin_root("/plugins/formatter")
            .protocol_version(CONTEXT_PROTOCOL_VERSION + 1)
            .build()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Internal);
    }

    #[test]
    fn build_succeeds_with_plugin_root() {
        let (ctx, signal) = ExecutionContextBuilder::new()
            .plugin_root("/plugins/formatter")
            .plugin_id(PluginId::from("acme/formatter"))
            .timeout_ms(5_000)
            .build()
            .unwrap();
        assert_eq!(ctx.plugin_root, "/plugins/formatter");
        assert!(ctx.remaining_ms() <= 5_000);
        assert!(!signal.is_cancelled());
        signal.cancel();
        assert!(ctx.signal.is_cancelled());
    }

    #[test]
    fn remaining_ms_saturates_at_zero_past_deadline() {
        let (ctx, _signal) = ExecutionContextBuilder::new()
            .plugin_root("/plugins/formatter")
            .timeout_ms(0)
            .build()
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(ctx.remaining_ms(), 0);
        assert!(ctx.is_past_deadline());
    }
}
