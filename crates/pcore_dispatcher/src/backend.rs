//! `ExecutionBackend` (§4.7): the seam the dispatcher hands a built
//! request to. Four implementations, one per entry in the backend
//! enum from §6's selection API.

use async_trait::async_trait;
use pcore_artifacts::ArtifactBroker;
use pcore_context::{ChainState, ExecutionContextBuilder};
use pcore_errors::ErrorCode;
use pcore_events::{EventBus, EventBusConfig};
pub use pcore_pool::{PoolConfig, PoolError as BackendError, PoolExecuteOutcome as BackendOutcome};
use pcore_pool::{WorkerHandle, WorkerOutcome, WorkerPool};
use pcore_protocol::ExecutionRequest;
use pcore_runtime::{EnvAccessor, FsShim, HttpClient, Logger};
use pcore_worker::{ArtifactClient, EventsClient, HandlerContext, HandlerLoader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, request: ExecutionRequest, timeout_ms: u64) -> Result<BackendOutcome, BackendError>;
}

fn handler_error(envelope: pcore_errors::ErrorEnvelope) -> BackendError {
    BackendError::Handler { code: envelope.code, message: envelope.message }
}

/// Calls a loaded handler directly in-thread — no process boundary,
/// no wire framing (§4.7 "in-process"). Grounded on the same
/// context/handler-context construction `pcore_worker::run` performs
/// for a spawned worker, just without the stdio hop around it.
pub struct InProcessBackend {
    loader: Arc<dyn HandlerLoader>,
    artifact_broker: Arc<ArtifactBroker>,
    dry_run: bool,
}

impl InProcessBackend {
    pub fn new(loader: Arc<dyn HandlerLoader>, artifact_broker: Arc<ArtifactBroker>, dry_run: bool) -> Self {
        Self { loader, artifact_broker, dry_run }
    }
}

#[async_trait]
impl ExecutionBackend for InProcessBackend {
    async fn execute(&self, request: ExecutionRequest, timeout_ms: u64) -> Result<BackendOutcome, BackendError> {
        let (context, signal) = ExecutionContextBuilder::new()
            .request_id(request.request_id.clone())
            .plugin_id(request.plugin_id.clone())
            .plugin_version(request.plugin_version.clone())
            .trace_id(request.trace_id.clone())
            .span_id(request.span_id.clone())
            .parent_span_id(request.parent_span_id.clone())
            .plugin_root(request.plugin_root.clone())
            .workdir(PathBuf::from(&request.plugin_root))
            .chain_state(ChainState::root(request.chain_limits.clone()))
            .timeout_ms(timeout_ms)
            .build()
            .map_err(handler_error)?;

        let handler = self.loader.load(&request.plugin_root, &request.handler_ref).map_err(handler_error)?;

        let operations = Arc::clone(&context.operations);
        let handler_context = Arc::new(HandlerContext {
            fs: FsShim::new(context.workdir.clone(), context.outdir.clone(), request.permissions.fs.clone(), self.dry_run),
            env: EnvAccessor::new(request.permissions.env.clone()),
            http: HttpClient::new(request.permissions.net.clone()),
            logger: Logger::new(
                context.request_id.clone(),
                context.trace_id.clone(),
                context.span_id.clone(),
                context.plugin_id.clone(),
            ),
            artifacts: ArtifactClient::new(
                Arc::clone(&self.artifact_broker),
                context.plugin_id.clone(),
                request.permissions.artifacts_read.clone(),
                request.permissions.artifacts_write.clone(),
            ),
            events: EventsClient::new(EventBus::new(EventBusConfig::default(), request.permissions.events.clone())),
            execution: context,
        });

        let started = Instant::now();
        let call = handler.call(request.input.clone(), handler_context);
        tokio::select! {
            result = call => match result {
                Ok(output) => Ok(BackendOutcome {
                    output,
                    operations: operations.to_array(),
                    execution_time_ms: started.elapsed().as_millis() as u64,
                }),
                Err(envelope) => Err(handler_error(envelope)),
            },
            _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                // No process to kill here; raising the signal is the only
                // lever this backend has over a handler that keeps running
                // past its deadline (§5 "Cancellation and timeouts").
                signal.cancel();
                Err(BackendError::Timeout)
            }
        }
    }
}

/// Spawns one `pcore-worker` child per call and tears it down after
/// (§4.7 "subprocess"). Reuses the same `WorkerHandle` the pool uses
/// for a pooled worker, just without a pool of peers around it.
pub struct SubprocessBackend {
    config: PoolConfig,
}

impl SubprocessBackend {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    async fn drive(&self, handle: &Arc<WorkerHandle>, request: ExecutionRequest, timeout_ms: u64) -> Result<BackendOutcome, BackendError> {
        let execution_id = request.execution_id.clone();
        let mut rx = handle.begin_execute(request).await?;

        let sleep_to_deadline = tokio::time::sleep(Duration::from_millis(timeout_ms));
        tokio::pin!(sleep_to_deadline);

        let outcome = tokio::select! {
            res = &mut rx => res,
            _ = &mut sleep_to_deadline => {
                handle.abort(execution_id).await;
                let grace = tokio::time::sleep(Duration::from_millis(self.config.abort_grace_ms));
                tokio::pin!(grace);
                match tokio::select! { res = &mut rx => Some(res), _ = &mut grace => None } {
                    Some(res) => res,
                    None => {
                        handle.force_kill().await;
                        return Err(BackendError::Timeout);
                    }
                }
            }
        };

        handle.finish_execute();
        match outcome {
            Ok(WorkerOutcome::Result { output, operations, execution_time_ms }) => {
                Ok(BackendOutcome { output, operations, execution_time_ms })
            }
            Ok(WorkerOutcome::HandlerError { code, message }) => {
                Err(BackendError::Handler { code: pcore_pool::parse_error_code(&code), message })
            }
            Err(_recv_error) => Err(BackendError::WorkerCrashed),
        }
    }
}

#[async_trait]
impl ExecutionBackend for SubprocessBackend {
    async fn execute(&self, request: ExecutionRequest, timeout_ms: u64) -> Result<BackendOutcome, BackendError> {
        let worker_id = pcore_pool::new_worker_id();
        let handle = WorkerHandle::spawn(worker_id, &self.config).await?;
        if !handle.try_claim() {
            return Err(BackendError::SpawnFailed("freshly spawned worker was not idle".into()));
        }
        let outcome = self.drive(&handle, request, timeout_ms).await;
        handle.shutdown_gracefully(self.config.shutdown_timeout_ms).await;
        outcome
    }
}

/// Delegates to a shared worker pool (§4.7 "worker-pool").
pub struct WorkerPoolBackend {
    pool: WorkerPool,
}

impl WorkerPoolBackend {
    pub fn new(pool: WorkerPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionBackend for WorkerPoolBackend {
    async fn execute(&self, request: ExecutionRequest, timeout_ms: u64) -> Result<BackendOutcome, BackendError> {
        self.pool.execute(request, timeout_ms).await
    }
}

/// `remote` is defined only at the dispatcher boundary and fails fast
/// (§4.7, §6): no remote transport is implemented by this core.
pub struct RemoteBackend;

#[async_trait]
impl ExecutionBackend for RemoteBackend {
    async fn execute(&self, _request: ExecutionRequest, _timeout_ms: u64) -> Result<BackendOutcome, BackendError> {
        Err(BackendError::Handler {
            code: ErrorCode::NotImplemented,
            message: "Remote execution backend not yet implemented".into(),
        })
    }
}
