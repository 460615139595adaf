//! Bounded root-cause inspection.
//!
//! Only ever invoked when debug mode is on — this is a handful of
//! substring checks over the message and trace, not a general
//! diagnostic engine, so it stays cheap even though nothing calls it
//! on the hot path.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RootCause {
    /// e.g. `MissingContext`, `PathTraversal`, `SchemaMismatch`.
    #[serde(rename = "type")]
    pub kind: String,
    pub fixes: Vec<String>,
    pub documentation: Option<String>,
}

struct Rule {
    kind: &'static str,
    needles: &'static [&'static str],
    fixes: &'static [&'static str],
    documentation: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        kind: "MissingContext",
        needles: &["context is required", "no execution context", "undefined context"],
        fixes: &["Ensure the execution context is constructed before the handler runs"],
        documentation: "errors/missing-context",
    },
    Rule {
        kind: "PathTraversal",
        needles: &["..", "path traversal", "escapes allowed root"],
        fixes: &["Use a path relative to the declared allow-list, without `..` segments"],
        documentation: "errors/path-traversal",
    },
    Rule {
        kind: "SchemaMismatch",
        needles: &["schema validation failed", "does not match schema", "invalid shape"],
        fixes: &["Compare the handler's input/output against its declared schema"],
        documentation: "errors/schema-mismatch",
    },
    Rule {
        kind: "PermissionGap",
        needles: &["permission denied", "not permitted", "capability missing"],
        fixes: &["Grant the missing capability or path in the plugin's permission manifest"],
        documentation: "errors/permission-gap",
    },
    Rule {
        kind: "WorkerUnavailable",
        needles: &["worker crashed", "broken pipe", "connection reset"],
        fixes: &["Check worker logs for an uncaught exception or OOM kill"],
        documentation: "errors/worker-unavailable",
    },
];

/// Inspect `message` (and optionally `trace`) against a small set of
/// known failure signatures. Returns `None` when nothing matches —
/// callers should not treat that as an error in itself.
pub fn inspect_root_cause(message: &str, trace: Option<&str>) -> Option<RootCause> {
    let haystack = match trace {
        Some(trace) => format!("{message}\n{trace}").to_lowercase(),
        None => message.to_lowercase(),
    };

    RULES.iter().find_map(|rule| {
        rule.needles
            .iter()
            .any(|needle| haystack.contains(needle))
            .then(|| RootCause {
                kind: rule.kind.to_string(),
                fixes: rule.fixes.iter().map(|s| s.to_string()).collect(),
                documentation: Some(rule.documentation.to_string()),
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_path_traversal() {
        let cause = inspect_root_cause("write denied: path escapes allowed root", None).unwrap();
        assert_eq!(cause.kind, "PathTraversal");
    }

    #[test]
    fn detects_schema_mismatch_from_trace() {
        let cause = inspect_root_cause("bad input", Some("Schema validation failed at $.foo")).unwrap();
        assert_eq!(cause.kind, "SchemaMismatch");
    }

    #[test]
    fn returns_none_for_unrecognised_message() {
        assert!(inspect_root_cause("something entirely unexpected happened", None).is_none());
    }
}
