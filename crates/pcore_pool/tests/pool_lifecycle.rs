//! Exercises `WorkerPool` against the real `pcore-worker` binary
//! (resolved via `CARGO_BIN_EXE_pcore-worker`) instead of a mock, so
//! admission, the stdio wire protocol, and shutdown draining all run
//! through an actual child process.

use pcore_ids::{ExecutionId, PluginId};
use pcore_pool::{PoolConfig, PoolError, WarmupConfig, WarmupMode, WorkerPool};
use pcore_protocol::{ChainLimits, ExecutionRequest, HandlerRef, HostContext, Permissions, Quotas};

fn sample_request(plugin: &str) -> ExecutionRequest {
    ExecutionRequest {
        execution_id: ExecutionId::new(),
        plugin_id: PluginId::from(plugin),
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

fn test_config(artifact_root: std::path::PathBuf) -> PoolConfig {
    PoolConfig {
        min: 1,
        max: 2,
        startup_timeout_ms: 10_000,
        shutdown_timeout_ms: 5_000,
        warmup: WarmupConfig { mode: WarmupMode::Eager, ..WarmupConfig::default() },
        worker_binary: std::path::PathBuf::from(env!("CARGO_BIN_EXE_pcore-worker")),
        artifact_root,
        ..PoolConfig::default()
    }
}

#[tokio::test]
async fn eager_warmup_spawns_min_workers() {
    let artifacts = tempfile::tempdir().unwrap();
    let pool = WorkerPool::start(test_config(artifacts.path().to_path_buf())).await;
    assert_eq!(pool.worker_count(), 1);
    pool.shutdown().await;
}

#[tokio::test]
async fn execute_against_empty_registry_reports_handler_not_found() {
    let artifacts = tempfile::tempdir().unwrap();
    let pool = WorkerPool::start(test_config(artifacts.path().to_path_buf())).await;

    // The shipped `pcore-worker` binary wires an empty handler
    // registry, so any dispatched execution resolves to a real
    // handshake and a real `HandlerNotFound` reported back over the
    // wire protocol, not a pool-side short-circuit.
    let request = sample_request("acme/formatter");
    let err = pool.execute(request, 5_000).await.unwrap_err();
    match err {
        PoolError::Handler { code, .. } => {
            assert_eq!(code, pcore_errors::ErrorCode::HandlerNotFound);
        }
        other => panic!("expected a handler error, got {other:?}"),
    }

    pool.shutdown().await;
}

#[tokio::test]
async fn shutdown_drains_worker_and_rejects_further_admission() {
    let artifacts = tempfile::tempdir().unwrap();
    let pool = WorkerPool::start(test_config(artifacts.path().to_path_buf())).await;
    assert_eq!(pool.worker_count(), 1);

    pool.shutdown().await;
    assert_eq!(pool.worker_count(), 0);

    let request = sample_request("acme/formatter");
    let err = pool.execute(request, 1_000).await.unwrap_err();
    assert!(matches!(err, PoolError::NotAvailable));
}
