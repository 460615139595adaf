//! Permission gates (C1): pure functions deciding whether a candidate
//! path, host, env key, or state namespace is accessible under a
//! plugin's declared permissions.
//!
//! No gate here performs I/O beyond the occasional existence check the
//! caller explicitly asks for — these functions are meant to be cheap
//! enough to call on every facade operation.

mod fs_gate;
mod net_gate;

pub use fs_gate::{check_fs, normalize_path, FsOp};
pub use net_gate::{check_net, normalize_host};

use pcore_ids::PluginId;
use pcore_protocol::{EnvPermission, Permissions, StateExternalEntry, StatePermission};
use serde::Serialize;

/// Patterns denied regardless of any `allow` entry. Direct access to
/// artifact directories is included because callers must go through
/// the artifact broker instead of the raw filesystem shim.
pub const SECURITY_CRITICAL_DENY: &[&str] = &[
    ".env*",
    ".ssh/**",
    "**/*.key",
    "**/*.secret",
    "**/artifacts/**",
];

/// Uniform failure contract for every gate: the caller decides whether
/// to turn a denial into a thrown error.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GateDecision {
    pub granted: bool,
    pub reason: Option<String>,
    pub remediation: Option<String>,
}

impl GateDecision {
    pub fn allow() -> Self {
        Self { granted: true, reason: None, remediation: None }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self { granted: false, reason: Some(reason.into()), remediation: None }
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateOp {
    Read,
    Write,
    Delete,
}

/// `env.allow`: exact key match, or a `PREFIX_*` pattern matching any
/// key sharing that prefix.
pub fn check_env(whitelist: &EnvPermission, key: &str) -> GateDecision {
    let matched = whitelist.allow.iter().any(|pattern| {
        if let Some(prefix) = pattern.strip_suffix('*') {
            key.starts_with(prefix)
        } else {
            pattern == key
        }
    });
    if matched {
        GateDecision::allow()
    } else {
        GateDecision::deny(format!("env key '{key}' is not in the allow list"))
            .with_remediation(format!("add '{key}' (or a matching PREFIX_* pattern) to permissions.env.allow"))
    }
}

fn find_external<'a>(perm: &'a StatePermission, namespace: &str) -> Option<&'a StateExternalEntry> {
    perm.external.iter().find(|entry| entry.namespace == namespace)
}

/// `state`: an implicit "own" namespace derived from the plugin id is
/// governed by `state.own`; anything else requires an explicit
/// `state.external` entry, and writes/deletes on external namespaces
/// require a non-empty `reason`.
pub fn check_state(
    perm: &StatePermission,
    namespace: &str,
    op: StateOp,
    plugin_id: &PluginId,
) -> GateDecision {
    let own_namespace = plugin_id.own_namespace();
    if namespace == own_namespace {
        let allowed = match op {
            StateOp::Read => perm.own.read,
            StateOp::Write => perm.own.write,
            StateOp::Delete => perm.own.delete,
        };
        return if allowed {
            GateDecision::allow()
        } else {
            GateDecision::deny(format!("own state namespace '{namespace}' does not grant {op:?}"))
                .with_remediation("set state.own.{read,write,delete} as required in the permission manifest")
        };
    }

    match find_external(perm, namespace) {
        None => GateDecision::deny(format!("state namespace '{namespace}' is not declared in state.external"))
            .with_remediation(format!("add an entry for '{namespace}' to permissions.state.external")),
        Some(entry) => {
            let allowed = match op {
                StateOp::Read => entry.read,
                StateOp::Write => entry.write,
                StateOp::Delete => entry.delete,
            };
            if !allowed {
                return GateDecision::deny(format!("external namespace '{namespace}' does not grant {op:?}"));
            }
            let needs_reason = matches!(op, StateOp::Write | StateOp::Delete);
            if needs_reason && entry.reason.as_deref().unwrap_or("").is_empty() {
                return GateDecision::deny(format!(
                    "external namespace '{namespace}' requires a non-empty reason for {op:?}"
                ))
                .with_remediation("add a `reason` string to the state.external entry");
            }
            GateDecision::allow()
        }
    }
}

/// A single access the caller wants checked, for batch evaluation via
/// [`check_all`].
#[derive(Debug, Clone)]
pub enum PermissionTarget<'a> {
    Fs { path: &'a str, op: FsOp },
    Net { host: &'a str },
    Env { key: &'a str },
    State { namespace: &'a str, op: StateOp, plugin_id: &'a PluginId },
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckAllResult {
    pub per_component: Vec<GateDecision>,
    pub all_granted: bool,
}

/// Evaluate a batch of targets against a single permission set,
/// short-circuiting nothing — every target is evaluated so the caller
/// gets a complete picture of what would and wouldn't be granted.
pub fn check_all(perms: &Permissions, targets: &[PermissionTarget<'_>]) -> CheckAllResult {
    let per_component: Vec<GateDecision> = targets
        .iter()
        .map(|target| match target {
            PermissionTarget::Fs { path, op } => check_fs(&perms.fs, path, *op),
            PermissionTarget::Net { host } => check_net(&perms.net, host),
            PermissionTarget::Env { key } => check_env(&perms.env, key),
            PermissionTarget::State { namespace, op, plugin_id } => {
                check_state(&perms.state, namespace, *op, plugin_id)
            }
        })
        .collect();
    let all_granted = per_component.iter().all(|d| d.granted);
    CheckAllResult { per_component, all_granted }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_allows_exact_and_prefix_keys() {
        let whitelist = EnvPermission { allow: vec!["API_URL".into(), "PLUGIN_*".into()] };
        assert!(check_env(&whitelist, "API_URL").granted);
        assert!(check_env(&whitelist, "PLUGIN_TOKEN_SCOPE").granted);
        assert!(!check_env(&whitelist, "DATABASE_URL").granted);
    }

    #[test]
    fn state_own_namespace_derived_from_plugin_id() {
        let plugin_id = PluginId::from("@acme/formatter-plugin");
        let perm = StatePermission {
            own: pcore_protocol::StateOwnPermission { read: true, write: false, delete: false },
            external: vec![],
        };
        assert!(check_state(&perm, "formatter", StateOp::Read, &plugin_id).granted);
        assert!(!check_state(&perm, "formatter", StateOp::Write, &plugin_id).granted);
    }

    #[test]
    fn state_external_write_requires_nonempty_reason() {
        let plugin_id = PluginId::from("acme/formatter");
        let perm = StatePermission {
            own: Default::default(),
            external: vec![StateExternalEntry {
                namespace: "shared".into(),
                read: true,
                write: true,
                delete: false,
                reason: Some(String::new()),
            }],
        };
        let decision = check_state(&perm, "shared", StateOp::Write, &plugin_id);
        assert!(!decision.granted);
        assert!(decision.reason.unwrap().contains("reason"));
    }

    #[test]
    fn state_external_undeclared_namespace_denied() {
        let plugin_id = PluginId::from("acme/formatter");
        let perm = StatePermission::default();
        assert!(!check_state(&perm, "other", StateOp::Read, &plugin_id).granted);
    }

    #[test]
    fn check_all_reports_per_target_and_aggregate() {
        let perms = Permissions {
            env: EnvPermission { allow: vec!["API_URL".into()] },
            ..Default::default()
        };
        let plugin_id = PluginId::from("acme/formatter");
        let targets = vec![
            PermissionTarget::Env { key: "API_URL" },
            PermissionTarget::Env { key: "SECRET_TOKEN" },
            PermissionTarget::State { namespace: "formatter", op: StateOp::Read, plugin_id: &plugin_id },
        ];
        let result = check_all(&perms, &targets);
        assert_eq!(result.per_component.len(), 3);
        assert!(!result.all_granted);
        assert!(result.per_component[0].granted);
        assert!(!result.per_component[1].granted);
    }
}
