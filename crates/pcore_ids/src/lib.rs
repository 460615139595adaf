//! Shared identifier wrappers for the plugin execution core.
//!
//! Every identifier that crosses a component boundary (dispatcher,
//! pool, worker, event bus) gets its own newtype so that, say, an
//! `ExecutionId` can never be passed where a `TraceId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Error returned when parsing a UUID-backed identifier fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    message: String,
}

impl IdParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for IdParseError {}

macro_rules! define_uuid_id {
    ($name:ident, $label:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn parse(value: &str) -> Result<Self, IdParseError> {
                Uuid::parse_str(value)
                    .map_err(|e| IdParseError::new(format!("Invalid {}: {}", $label, e)))?;
                Ok(Self(value.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

macro_rules! define_opaque_id {
    ($name:ident) => {
        /// Opaque, caller-assigned identifier (not necessarily a UUID).
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }
    };
}

// Admission-time, host-generated identifiers. Always UUIDs so that
// `checkAll`/envelope correlation can assume a canonical shape.
define_uuid_id!(ExecutionId, "execution ID");
define_uuid_id!(RequestId, "request ID");
define_uuid_id!(TraceId, "trace ID");
define_uuid_id!(SpanId, "span ID");

// Caller- or config-supplied identifiers. Plugin ids in particular are
// not UUIDs (`@scope/name` or `name`), so these stay opaque strings.
define_opaque_id!(PluginId);
define_opaque_id!(TenantId);
define_opaque_id!(WorkerId);

impl PluginId {
    /// Strip an `@scope/` prefix and a trailing `-plugin` suffix, the
    /// derivation rule §4.1 uses for a plugin's "own" state namespace.
    pub fn own_namespace(&self) -> &str {
        let without_scope = match self.0.split_once('/') {
            Some((scope, rest)) if scope.starts_with('@') => rest,
            _ => self.0.as_str(),
        };
        without_scope
            .strip_suffix("-plugin")
            .unwrap_or(without_scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_id_round_trips() {
        let id = ExecutionId::new();
        let parsed = ExecutionId::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn execution_id_rejects_garbage() {
        assert!(ExecutionId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn plugin_id_own_namespace_strips_scope_and_suffix() {
        assert_eq!(PluginId::from("@acme/formatter-plugin").own_namespace(), "formatter");
        assert_eq!(PluginId::from("formatter-plugin").own_namespace(), "formatter");
        assert_eq!(PluginId::from("formatter").own_namespace(), "formatter");
    }
}
