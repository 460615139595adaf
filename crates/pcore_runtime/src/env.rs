//! Whitelisted environment variable accessor.

use crate::error::{FacadeError, FacadeResult};
use pcore_permissions::check_env;
use pcore_protocol::EnvPermission;
use std::collections::HashMap;

pub struct EnvAccessor {
    permission: EnvPermission,
    /// Process environment is snapshotted once at construction so a
    /// handler can't observe changes made by a sibling execution.
    snapshot: HashMap<String, String>,
}

impl EnvAccessor {
    pub fn new(permission: EnvPermission) -> Self {
        Self { permission, snapshot: std::env::vars().collect() }
    }

    #[cfg(test)]
    fn with_snapshot(permission: EnvPermission, snapshot: HashMap<String, String>) -> Self {
        Self { permission, snapshot }
    }

    pub fn get(&self, key: &str) -> FacadeResult<Option<String>> {
        let decision = check_env(&self.permission, key);
        if !decision.granted {
            return Err(FacadeError::EnvNotWhitelisted(key.to_string()));
        }
        Ok(self.snapshot.get(key).cloned())
    }
}
