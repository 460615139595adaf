//! The parent↔worker stdio loop (§4.5 steps 1, 2, 4, 5, 6): reads
//! framed `HostMessage`s from the pool and writes framed
//! `WorkerMessage`s back. Execution itself runs as a spawned task so
//! the loop stays responsive to `abort`/`health` while a handler is
//! in flight, matching the teacher's "async only where truly needed"
//! principle for the blocking parts underneath it.

use crate::handler::{ArtifactClient, EventsClient, HandlerContext, HandlerLoader};
use pcore_artifacts::ArtifactBroker;
use pcore_context::{CancellationSignal, ChainState, ExecutionContextBuilder};
use pcore_events::{EventBus, EventBusConfig};
use pcore_ids::ExecutionId;
use pcore_protocol::{read_frame_async, write_frame_async, HostMessage, WorkerMessage};
use pcore_runtime::{EnvAccessor, FsShim, HttpClient, Logger};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

/// Tunables that come from the pool when it spawns this worker,
/// rather than from any on-disk config the worker would read itself.
pub struct WorkerOptions {
    pub artifact_base: PathBuf,
    pub dry_run: bool,
}

struct InFlight {
    signal: CancellationSignal,
}

async fn send<W: AsyncWrite + Unpin>(writer: &AsyncMutex<W>, message: &WorkerMessage) {
    let mut guard = writer.lock().await;
    if let Err(e) = write_frame_async(&mut *guard, message).await {
        error!(error = %e, "failed writing frame to parent; pipe likely closed");
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn error_message(execution_id: ExecutionId, envelope: pcore_errors::ErrorEnvelope) -> WorkerMessage {
    WorkerMessage::Error {
        execution_id,
        message: envelope.message,
        code: envelope.code.as_str().to_string(),
    }
}

/// Drives the loop until stdin closes (the pool tore down the pipe)
/// or a `shutdown` message finishes waiting out its grace period.
pub async fn run_worker_loop<R, W>(mut reader: R, writer: W, loader: Arc<dyn HandlerLoader>, opts: WorkerOptions)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = Arc::new(AsyncMutex::new(writer));
    send(&writer, &WorkerMessage::Ready { pid: std::process::id() }).await;

    let started_at = Instant::now();
    let requests_served = Arc::new(AtomicU64::new(0));
    let in_flight: Arc<AsyncMutex<HashMap<ExecutionId, InFlight>>> = Arc::new(AsyncMutex::new(HashMap::new()));
    let artifact_broker = Arc::new(ArtifactBroker::new(opts.artifact_base.clone()));

    loop {
        let message: HostMessage = match read_frame_async(&mut reader).await {
            Ok(m) => m,
            Err(e) => {
                info!(error = %e, "worker stdin closed; exiting loop");
                break;
            }
        };

        match message {
            HostMessage::Execute { request } => {
                let execution_id = request.execution_id.clone();
                let (context, signal) = match ExecutionContextBuilder::new()
                    .request_id(request.request_id.clone())
                    .plugin_id(request.plugin_id.clone())
                    .plugin_version(request.plugin_version.clone())
                    .trace_id(request.trace_id.clone())
                    .span_id(request.span_id.clone())
                    .parent_span_id(request.parent_span_id.clone())
                    .plugin_root(request.plugin_root.clone())
                    .workdir(PathBuf::from(&request.plugin_root))
                    .chain_state(ChainState::root(request.chain_limits.clone()))
                    .timeout_ms(request.deadline_ts_ms.saturating_sub(now_ms()))
                    .build()
                {
                    Ok(pair) => pair,
                    Err(envelope) => {
                        send(&writer, &error_message(execution_id, envelope)).await;
                        continue;
                    }
                };

                let handler = match loader.load(&request.plugin_root, &request.handler_ref) {
                    Ok(h) => h,
                    Err(envelope) => {
                        send(&writer, &error_message(execution_id, envelope)).await;
                        continue;
                    }
                };

                in_flight.lock().await.insert(execution_id.clone(), InFlight { signal });

                let handler_context = Arc::new(HandlerContext {
                    fs: FsShim::new(
                        context.workdir.clone(),
                        context.outdir.clone(),
                        request.permissions.fs.clone(),
                        opts.dry_run,
                    ),
                    env: EnvAccessor::new(request.permissions.env.clone()),
                    http: HttpClient::new(request.permissions.net.clone()),
                    logger: Logger::new(
                        context.request_id.clone(),
                        context.trace_id.clone(),
                        context.span_id.clone(),
                        context.plugin_id.clone(),
                    ),
                    artifacts: ArtifactClient::new(
                        Arc::clone(&artifact_broker),
                        context.plugin_id.clone(),
                        request.permissions.artifacts_read.clone(),
                        request.permissions.artifacts_write.clone(),
                    ),
                    events: EventsClient::new(EventBus::new(EventBusConfig::default(), request.permissions.events.clone())),
                    execution: context,
                });

                let operations = Arc::clone(&handler_context.execution.operations);
                let writer = Arc::clone(&writer);
                let in_flight = Arc::clone(&in_flight);
                let requests_served = Arc::clone(&requests_served);
                let input = request.input.clone();
                let exec_id_for_task = execution_id;

                tokio::spawn(async move {
                    let exec_start = Instant::now();
                    let result = handler.call(input, handler_context).await;
                    requests_served.fetch_add(1, Ordering::SeqCst);
                    in_flight.lock().await.remove(&exec_id_for_task);

                    let message = match result {
                        Ok(output) => WorkerMessage::Result {
                            execution_id: exec_id_for_task,
                            output,
                            operations: operations.to_array(),
                            execution_time_ms: exec_start.elapsed().as_millis() as u64,
                        },
                        Err(envelope) => error_message(exec_id_for_task, envelope),
                    };
                    send(&writer, &message).await;
                });
            }
            HostMessage::Abort { execution_id } => {
                let guard = in_flight.lock().await;
                match guard.get(&execution_id) {
                    Some(entry) => {
                        entry.signal.cancel();
                        info!(%execution_id, "cancellation signal raised for in-flight execution");
                    }
                    None => warn!(%execution_id, "abort received for unknown or already-finished execution"),
                }
            }
            HostMessage::HealthCheck => {
                send(
                    &writer,
                    &WorkerMessage::Health {
                        healthy: true,
                        requests_served: requests_served.load(Ordering::SeqCst),
                        uptime_ms: started_at.elapsed().as_millis() as u64,
                    },
                )
                .await;
            }
            HostMessage::Shutdown { grace_ms } => {
                info!(grace_ms, "shutdown requested; waiting for in-flight executions to finish");
                let deadline = Instant::now() + Duration::from_millis(grace_ms);
                while Instant::now() < deadline && !in_flight.lock().await.is_empty() {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                break;
            }
        }
    }
}
