//! Artifact-specific permission matching: `artifacts.read[]` /
//! `artifacts.write[]` entries, each scoped to an owner and a set of
//! path globs (using the glob semantics of the filesystem gate).

use globset::{Glob, GlobSetBuilder};
use pcore_ids::PluginId;
use pcore_permissions::GateDecision;
use pcore_protocol::{ArtifactReadEntry, ArtifactWriteEntry};

fn path_matches(patterns: &[String], logical: &str) -> bool {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().map(|set| set.is_match(logical)).unwrap_or(false)
}

pub fn check_artifact_read(
    entries: &[ArtifactReadEntry],
    source_plugin: &PluginId,
    logical: &str,
    accept: Option<&[String]>,
    self_id: &PluginId,
) -> GateDecision {
    let matching_entry = entries.iter().find(|entry| {
        entry.from.matches(source_plugin, self_id) && path_matches(&entry.paths, logical)
    });

    let Some(entry) = matching_entry else {
        return GateDecision::deny(format!(
            "no artifacts.read entry grants access to '{logical}' from '{}'",
            source_plugin.as_str()
        ))
        .with_remediation(format!("add '{logical}' to permissions.artifactsRead"));
    };

    if let (Some(allowed_types), Some(accept)) = (&entry.allowed_types, accept) {
        let intersects = accept.iter().any(|a| allowed_types.contains(a));
        if !intersects {
            return GateDecision::deny(format!(
                "requested content types {accept:?} do not intersect allowedTypes {allowed_types:?}"
            ));
        }
    }

    GateDecision::allow()
}

pub fn check_artifact_write(
    entries: &[ArtifactWriteEntry],
    target_plugin: &PluginId,
    logical: &str,
    self_id: &PluginId,
) -> GateDecision {
    let granted = entries
        .iter()
        .any(|entry| entry.to.matches(target_plugin, self_id) && path_matches(&entry.paths, logical));

    if granted {
        GateDecision::allow()
    } else {
        GateDecision::deny(format!(
            "no artifacts.write entry grants access to '{logical}' for '{}'",
            target_plugin.as_str()
        ))
        .with_remediation(format!("add '{logical}' to permissions.artifactsWrite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcore_protocol::ArtifactOwner;

    #[test]
    fn self_owned_read_entry_matches_caller() {
        let self_id = PluginId::from("acme/formatter");
        let entries = vec![ArtifactReadEntry {
            from: ArtifactOwner::SelfOwned,
            paths: vec!["out/*.json".into()],
            allowed_types: None,
        }];
        let decision = check_artifact_read(&entries, &self_id, "out/result.json", None, &self_id);
        assert!(decision.granted);
    }

    #[test]
    fn allowed_types_intersection_required() {
        let self_id = PluginId::from("acme/formatter");
        let entries = vec![ArtifactReadEntry {
            from: ArtifactOwner::SelfOwned,
            paths: vec!["**".into()],
            allowed_types: Some(vec!["application/json".into()]),
        }];
        let decision = check_artifact_read(
            &entries,
            &self_id,
            "out/result.csv",
            Some(&["text/csv".to_string()]),
            &self_id,
        );
        assert!(!decision.granted);
    }

    #[test]
    fn write_denied_without_matching_entry() {
        let self_id = PluginId::from("acme/formatter");
        let decision = check_artifact_write(&[], &self_id, "out/result.json", &self_id);
        assert!(!decision.granted);
    }
}
