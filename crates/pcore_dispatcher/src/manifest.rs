//! The handler-declared manifest facts the dispatch pipeline checks
//! against a request before and after handing it to a backend.
//!
//! Everything else about a plugin manifest (entry points, declared
//! dependencies, on-disk layout) belongs to the config-loading
//! collaborator `spec.md` §1 places out of scope; this is only the
//! slice the dispatcher itself consults.

use serde_json::Value;

/// Static facts about a handler, read from its plugin manifest ahead
/// of dispatch. An embedder builds one of these per `(pluginId,
/// handlerRef)` pair; this crate never loads manifests itself.
#[derive(Debug, Clone, Default)]
pub struct HandlerManifest {
    /// Capability flags this handler requires, checked as a subset of
    /// `request.permissions.capabilities` (§4.7 step 3).
    pub required_capabilities: Vec<String>,
    /// JSON Schema the input must satisfy, if the manifest declares one.
    pub input_schema: Option<Value>,
    /// JSON Schema the output must satisfy, if the manifest declares one.
    pub output_schema: Option<Value>,
    /// Artifact ids the handler may return data for under those exact
    /// keys (or a camelCase/kebab-case spelling of them) in its output
    /// object, written back through the broker after a successful call
    /// (§4.7 step 7).
    pub declared_artifacts: Vec<String>,
}

impl HandlerManifest {
    pub fn missing_capabilities(&self, granted: &[String]) -> Vec<String> {
        self.required_capabilities
            .iter()
            .filter(|needed| !granted.iter().any(|g| g == *needed))
            .cloned()
            .collect()
    }
}

/// kebab-case -> camelCase, e.g. `"report-summary"` -> `"reportSummary"`.
pub fn kebab_to_camel(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut upper_next = false;
    for ch in id.chars() {
        if ch == '-' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// camelCase -> kebab-case, e.g. `"reportSummary"` -> `"report-summary"`.
pub fn camel_to_kebab(id: &str) -> String {
    let mut out = String::with_capacity(id.len() + 4);
    for (i, ch) in id.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            out.push('-');
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Find the output object key matching a declared artifact id by
/// exact spelling, camelCase, or kebab-case (§4.7 step 7).
pub fn find_declared_artifact_key<'a>(output: &'a Value, id: &str) -> Option<(&'a str, &'a Value)> {
    let object = output.as_object()?;
    let camel = kebab_to_camel(id);
    let kebab = camel_to_kebab(id);
    for candidate in [id, camel.as_str(), kebab.as_str()] {
        if let Some((key, value)) = object.get_key_value(candidate) {
            return Some((key.as_str(), value));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_capabilities_reports_only_ungranted() {
        let manifest = HandlerManifest {
            required_capabilities: vec!["shell:exec".into(), "net:fetch".into()],
            ..Default::default()
        };
        let missing = manifest.missing_capabilities(&["net:fetch".to_string()]);
        assert_eq!(missing, vec!["shell:exec".to_string()]);
    }

    #[test]
    fn kebab_to_camel_converts_hyphens() {
        assert_eq!(kebab_to_camel("report-summary"), "reportSummary");
        assert_eq!(kebab_to_camel("summary"), "summary");
    }

    #[test]
    fn camel_to_kebab_converts_humps() {
        assert_eq!(camel_to_kebab("reportSummary"), "report-summary");
        assert_eq!(camel_to_kebab("summary"), "summary");
    }

    #[test]
    fn find_declared_artifact_key_matches_any_spelling() {
        let output = serde_json::json!({"reportSummary": {"ok": true}});
        let (key, _) = find_declared_artifact_key(&output, "report-summary").unwrap();
        assert_eq!(key, "reportSummary");
        assert!(find_declared_artifact_key(&output, "missing").is_none());
    }
}
