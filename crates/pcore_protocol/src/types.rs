//! Data model shared by every component: execution requests,
//! permissions, artifacts, event envelopes, and operation records.
//!
//! These types are serialised across the parent↔worker wire (`wire.rs`)
//! and passed in-process between the dispatcher, pool, and runtime
//! facade, so every field here is exactly what §3 of the design
//! describes — no host-specific extensions are bolted on.

use pcore_ids::{ExecutionId, PluginId, RequestId, SpanId, TenantId, TraceId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A file path plus an exported function name inside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandlerRef {
    pub file: String,
    pub export: String,
}

/// Tagged union of the hosts that can originate an execution request.
/// Replaces a dynamically-shaped "context object" per the REDESIGN
/// FLAGS note on dynamic contexts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HostContext {
    Cli,
    Rest,
    Workflow,
}

/// Caps on transitive plugin-to-plugin invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainLimits {
    pub max_depth: u32,
    pub max_fan_out: u32,
    pub max_chain_time_ms: u64,
}

impl Default for ChainLimits {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_fan_out: 16,
            max_chain_time_ms: 5 * 60 * 1000,
        }
    }
}

/// Numeric resource caps attached to a request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Quotas {
    pub time_ms: Option<u64>,
    pub memory_mb: Option<u64>,
    pub cpu_ms: Option<u64>,
    pub events_per_minute: Option<u32>,
}

// ---------------------------------------------------------------------
// Permissions (§3 "Permissions")
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FsMode {
    None,
    Read,
    ReadWrite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FsPermission {
    pub mode: Option<FsMode>,
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

impl FsPermission {
    pub fn mode(&self) -> FsMode {
        self.mode.unwrap_or(FsMode::None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum NetPermission {
    None,
    Allow {
        #[serde(default)]
        allow_hosts: Vec<String>,
        #[serde(default)]
        deny_hosts: Vec<String>,
        #[serde(default)]
        allow_cidrs: Vec<String>,
    },
}

impl Default for NetPermission {
    fn default() -> Self {
        NetPermission::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EnvPermission {
    #[serde(default)]
    pub allow: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StateOwnPermission {
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub delete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateExternalEntry {
    pub namespace: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StatePermission {
    #[serde(default)]
    pub own: StateOwnPermission,
    #[serde(default)]
    pub external: Vec<StateExternalEntry>,
}

/// `from`/`to` target of an artifact permission entry: either another
/// plugin's namespace, or the literal `self`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ArtifactOwner {
    SelfOwned,
    Plugin(PluginId),
}

impl ArtifactOwner {
    pub fn matches(&self, candidate: &PluginId, self_id: &PluginId) -> bool {
        match self {
            ArtifactOwner::SelfOwned => candidate == self_id,
            ArtifactOwner::Plugin(p) => p == candidate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactReadEntry {
    pub from: ArtifactOwner,
    pub paths: Vec<String>,
    #[serde(default)]
    pub allowed_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactWriteEntry {
    pub to: ArtifactOwner,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventScope {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "plugin")]
    Plugin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EventsPermission {
    #[serde(default)]
    pub produce: Vec<String>,
    #[serde(default)]
    pub consume: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<EventScope>,
}

/// The full permission grant attached to an execution request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    #[serde(default)]
    pub fs: FsPermission,
    #[serde(default)]
    pub net: NetPermission,
    #[serde(default)]
    pub env: EnvPermission,
    #[serde(default)]
    pub state: StatePermission,
    #[serde(default)]
    pub artifacts_read: Vec<ArtifactReadEntry>,
    #[serde(default)]
    pub artifacts_write: Vec<ArtifactWriteEntry>,
    #[serde(default)]
    pub events: EventsPermission,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub quotas: Quotas,
}

// ---------------------------------------------------------------------
// Execution request (§3 "Execution request")
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub execution_id: ExecutionId,
    pub plugin_id: PluginId,
    pub plugin_version: String,
    pub handler_ref: HandlerRef,
    pub plugin_root: String,
    pub input: serde_json::Value,
    pub permissions: Permissions,
    pub quotas: Quotas,
    pub host_context: HostContext,
    pub tenant_id: Option<TenantId>,
    pub request_id: RequestId,
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub chain_limits: ChainLimits,
    /// Milliseconds since the Unix epoch.
    pub deadline_ts_ms: u64,
}

// ---------------------------------------------------------------------
// Artifacts (§3 "Artifact")
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Pending,
    Ready,
    Expired,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactMeta {
    pub owner: PluginId,
    pub size: u64,
    pub sha256: String,
    pub content_type: String,
    pub encoding: Option<String>,
    /// Semver of the publishing plugin at write time, so `list` can
    /// filter by `minVersion` (§4.3). Defaults to `0.0.0` for writes
    /// that don't supply one.
    pub version: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    pub updated_at: u64,
    pub status: ArtifactStatus,
    pub ttl_ms: Option<u64>,
    pub expires_at: Option<u64>,
}

// ---------------------------------------------------------------------
// Event bus (§3 "Event envelope")
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EventMeta {
    pub trace_id: Option<TraceId>,
    pub span_id: Option<SpanId>,
    pub parent_span_id: Option<SpanId>,
    pub request_id: Option<RequestId>,
    pub emitter: Option<PluginId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    pub event_id: String,
    pub idempotency_key: Option<String>,
    pub topic: String,
    pub scope: EventScope,
    /// Milliseconds since the Unix epoch.
    pub ts: u64,
    pub payload: serde_json::Value,
    pub meta: EventMeta,
}

// ---------------------------------------------------------------------
// Operation tracker (§3 "Operation record")
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Applied,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationRecord {
    pub id: u64,
    /// Open-ended per §3 ("kind∈{file,config,…}") — callers coin their
    /// own kind strings, the tracker never validates them.
    pub kind: String,
    pub action: String,
    pub path: Option<String>,
    pub pointer: Option<String>,
    pub status: OperationStatus,
    pub reason: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Arbitrary metadata payload attached to an operation when tracked.
pub type OperationMetadata = HashMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_round_trip_through_json() {
        let perms = Permissions {
            fs: FsPermission {
                mode: Some(FsMode::Read),
                allow: vec!["src/**/*.tsx".into()],
                deny: vec![],
            },
            net: NetPermission::Allow {
                allow_hosts: vec!["*.example.com".into()],
                deny_hosts: vec![],
                allow_cidrs: vec![],
            },
            ..Default::default()
        };
        let json = serde_json::to_string(&perms).unwrap();
        let parsed: Permissions = serde_json::from_str(&json).unwrap();
        assert_eq!(perms, parsed);
    }

    #[test]
    fn artifact_owner_self_matches_caller_id() {
        let owner = ArtifactOwner::SelfOwned;
        let caller = PluginId::from("acme/formatter");
        assert!(owner.matches(&caller, &caller));
    }

    #[test]
    fn artifact_owner_named_matches_exact_plugin() {
        let owner = ArtifactOwner::Plugin(PluginId::from("acme/other"));
        let caller = PluginId::from("acme/formatter");
        assert!(!owner.matches(&caller, &caller));
        assert!(owner.matches(&PluginId::from("acme/other"), &caller));
    }
}
