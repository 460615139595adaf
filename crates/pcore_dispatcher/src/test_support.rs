//! Shared request fixture for this crate's unit tests, mirroring the
//! equivalent fixture in `pcore_pool`'s test module.

use pcore_protocol::{ChainLimits, ExecutionRequest, HandlerRef, HostContext, Permissions, Quotas};

pub fn sample_request(plugin: &str) -> ExecutionRequest {
    ExecutionRequest {
        execution_id: pcore_ids::ExecutionId::new(),
        plugin_id: pcore_ids::PluginId::from(plugin),
        plugin_version: "1.0.0".into(),
        handler_ref: HandlerRef { file: "index.js".into(), export: "run".into() },
        plugin_root: "/plugins/formatter".into(),
        input: serde_json::json!({}),
        permissions: Permissions::default(),
        quotas: Quotas::default(),
        host_context: HostContext::Cli,
        tenant_id: None,
        request_id: pcore_ids::RequestId::new(),
        trace_id: pcore_ids::TraceId::new(),
        span_id: pcore_ids::SpanId::new(),
        parent_span_id: None,
        chain_limits: ChainLimits::default(),
        deadline_ts_ms: 0,
    }
}
