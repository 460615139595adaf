//! Backend mode selection (§4.7, §6).
//!
//! The dispatcher crate never calls `std::env::var` outside
//! [`EnvSnapshot::from_process_env`] — every other function here takes
//! already-read values so selection stays pure and testable.

use pcore_errors::{ErrorCode, ErrorEnvelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    InProcess,
    Subprocess,
    WorkerPool,
    Remote,
}

impl Mode {
    pub fn parse(value: &str) -> Result<Self, ErrorEnvelope> {
        match value {
            "in-process" => Ok(Mode::InProcess),
            "subprocess" => Ok(Mode::Subprocess),
            "worker-pool" => Ok(Mode::WorkerPool),
            "remote" => Ok(Mode::Remote),
            other => Err(ErrorEnvelope::builder(
                ErrorCode::UnknownMode,
                format!("unknown execution mode {other:?}"),
            )
            .detail("mode", other)
            .fix("use one of in-process, subprocess, worker-pool, remote, auto")
            .build()),
        }
    }
}

/// The §6 environment variables, read once by an embedder and passed
/// in — see [`EnvSnapshot::from_process_env`] for the one place that
/// actually touches `std::env`.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    pub executor_service_endpoint: Option<String>,
    pub execution_mode: Option<String>,
    pub kubernetes_service_host: Option<String>,
    pub kb_plugin_dev_mode: bool,
}

impl EnvSnapshot {
    /// The single narrow function in this crate that reads process
    /// environment variables directly.
    pub fn from_process_env() -> Self {
        Self {
            executor_service_endpoint: std::env::var("EXECUTOR_SERVICE_ENDPOINT").ok(),
            execution_mode: std::env::var("EXECUTION_MODE").ok(),
            kubernetes_service_host: std::env::var("KUBERNETES_SERVICE_HOST").ok(),
            kb_plugin_dev_mode: std::env::var("KB_PLUGIN_DEV_MODE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

/// Resolves an explicit mode (or `auto`) plus the environment snapshot
/// into a concrete [`Mode`] (§4.7 "Backend selection", §6 "Backend
/// selection API").
pub struct BackendSelector;

impl BackendSelector {
    /// `mode` is `None` for `auto`, `Some(value)` for an explicit
    /// override from the mode enum (already parsed by the caller via
    /// [`Mode::parse`], or `createExecutionBackend`'s `mode` field).
    pub fn select(mode: Option<Mode>, env: &EnvSnapshot) -> Result<Mode, ErrorEnvelope> {
        // KB_PLUGIN_DEV_MODE overrides everything, explicit mode included.
        if env.kb_plugin_dev_mode {
            return Ok(Mode::InProcess);
        }

        let resolved = match mode {
            Some(explicit) => explicit,
            None => Self::auto(env),
        };

        Ok(resolved)
    }

    fn auto(env: &EnvSnapshot) -> Mode {
        if env.executor_service_endpoint.is_some() {
            return Mode::Remote;
        }
        let worker_pool_configured =
            env.execution_mode.as_deref() == Some("worker-pool") || env.kubernetes_service_host.is_some();
        if worker_pool_configured {
            return Mode::WorkerPool;
        }
        Mode::InProcess
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_mode_overrides_everything() {
        let env = EnvSnapshot {
            execution_mode: Some("worker-pool".into()),
            kb_plugin_dev_mode: true,
            ..Default::default()
        };
        assert_eq!(BackendSelector::select(Some(Mode::Remote), &env).unwrap(), Mode::InProcess);
    }

    #[test]
    fn auto_prefers_remote_when_endpoint_configured() {
        let env = EnvSnapshot {
            executor_service_endpoint: Some("http://localhost:9000".into()),
            ..Default::default()
        };
        assert_eq!(BackendSelector::select(None, &env).unwrap(), Mode::Remote);
    }

    #[test]
    fn auto_prefers_worker_pool_under_kubernetes_indicator() {
        let env = EnvSnapshot { kubernetes_service_host: Some("10.0.0.1".into()), ..Default::default() };
        assert_eq!(BackendSelector::select(None, &env).unwrap(), Mode::WorkerPool);
    }

    #[test]
    fn auto_falls_back_to_in_process() {
        let env = EnvSnapshot::default();
        assert_eq!(BackendSelector::select(None, &env).unwrap(), Mode::InProcess);
    }

    #[test]
    fn explicit_mode_is_honoured_without_dev_override() {
        let env = EnvSnapshot::default();
        assert_eq!(BackendSelector::select(Some(Mode::Subprocess), &env).unwrap(), Mode::Subprocess);
    }

    #[test]
    fn parse_rejects_unknown_mode() {
        let err = Mode::parse("quantum").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownMode);
    }
}
