//! `artifact://<pluginId>/<logical>` addressing.

use crate::error::ArtifactError;
use pcore_ids::PluginId;

pub const SCHEME_PREFIX: &str = "artifact://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactUri {
    pub plugin_id: PluginId,
    pub logical: String,
}

impl ArtifactUri {
    pub fn parse(uri: &str) -> Result<Self, ArtifactError> {
        let rest = uri
            .strip_prefix(SCHEME_PREFIX)
            .ok_or_else(|| ArtifactError::InvalidUri(uri.to_string()))?;

        let mut segments = rest.split('/');
        let first = segments.next().unwrap_or("");
        if first.is_empty() {
            return Err(ArtifactError::InvalidUri(uri.to_string()));
        }

        let (plugin_id_str, remainder): (String, Vec<&str>) = if first.starts_with('@') {
            match segments.next() {
                Some(second) if !second.is_empty() => {
                    (format!("{first}/{second}"), segments.collect())
                }
                _ => return Err(ArtifactError::InvalidUri(uri.to_string())),
            }
        } else {
            (first.to_string(), segments.collect())
        };

        let logical = remainder.join("/");
        if logical.is_empty() {
            return Err(ArtifactError::InvalidUri(uri.to_string()));
        }

        Ok(Self { plugin_id: PluginId::from(plugin_id_str), logical })
    }

    pub fn to_uri_string(&self) -> String {
        format!("{SCHEME_PREFIX}{}/{}", self.plugin_id.as_str(), self.logical)
    }
}
