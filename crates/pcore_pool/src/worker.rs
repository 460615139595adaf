//! A single spawned `pcore-worker` child process and the plumbing to
//! talk its wire protocol: handshake on spawn, dispatch `execute`,
//! `abort`, and `health` messages, and notice when the process exits
//! without being told to.
//!
//! State transitions (§4.6): `starting → idle → busy → idle → … →
//! draining → stopped`. A worker that never reaches `idle` within
//! `startupTimeoutMs` never enters the pool's worker map at all.

use crate::config::PoolConfig;
use crate::error::PoolError;
use parking_lot::Mutex as SyncMutex;
use pcore_ids::{ExecutionId, PluginId, WorkerId};
use pcore_protocol::{
    read_frame_async, write_frame_async, ExecutionRequest, HostMessage, OperationRecord, WorkerMessage,
};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Idle,
    Busy,
    Draining,
    Stopped,
}

/// What a worker handed back for one `execute` round-trip.
#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    Result { output: serde_json::Value, operations: Vec<OperationRecord>, execution_time_ms: u64 },
    HandlerError { code: String, message: String },
}

type ResultWaiters = HashMap<ExecutionId, oneshot::Sender<WorkerOutcome>>;
type HealthWaiters = Vec<oneshot::Sender<(bool, u64, u64)>>;

struct Pending {
    results: ResultWaiters,
    health: HealthWaiters,
}

/// One pooled worker process plus everything the pool needs to route
/// messages to and from it. Cheap to clone (it's an `Arc` wrapper);
/// clones share the same underlying process.
pub struct WorkerHandle {
    pub id: WorkerId,
    child: AsyncMutex<Child>,
    stdin: AsyncMutex<ChildStdin>,
    pending: Arc<SyncMutex<Pending>>,
    state: SyncMutex<WorkerState>,
    request_count: AtomicU32,
    spawned_at: Instant,
    healthy: AtomicBool,
    current_execution: SyncMutex<Option<ExecutionId>>,
    current_plugin: SyncMutex<Option<PluginId>>,
    reader: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

fn reject_all_pending(pending: &Arc<SyncMutex<Pending>>) {
    let mut guard = pending.lock();
    guard.results.clear();
    guard.health.clear();
}

impl WorkerHandle {
    /// Spawn the worker binary and block until it either handshakes
    /// with `ready` or `startupTimeoutMs` elapses. A worker that fails
    /// to come up is killed and never reported to the caller — per
    /// §4.6 it "transitions straight to `stopped` and is discarded".
    pub async fn spawn(id: WorkerId, config: &PoolConfig) -> Result<Arc<Self>, PoolError> {
        let mut command = Command::new(&config.worker_binary);
        command
            .arg("--artifact-root")
            .arg(&config.artifact_root)
            .env("KB_WORKER_ID", id.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| PoolError::SpawnFailed(e.to_string()))?;
        let stdin = child.stdin.take().ok_or_else(|| PoolError::SpawnFailed("no stdin pipe".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| PoolError::SpawnFailed("no stdout pipe".into()))?;
        let mut stdout = BufReader::new(stdout);

        let handshake = tokio::time::timeout(
            Duration::from_millis(config.startup_timeout_ms),
            read_frame_async::<_, WorkerMessage>(&mut stdout),
        )
        .await;

        match handshake {
            Ok(Ok(WorkerMessage::Ready { pid })) => {
                debug!(%id, pid, "worker handshake complete");
            }
            Ok(Ok(other)) => {
                let _ = child.start_kill();
                return Err(PoolError::SpawnFailed(format!("expected ready handshake, got {other:?}")));
            }
            Ok(Err(e)) => {
                let _ = child.start_kill();
                return Err(PoolError::SpawnFailed(format!("handshake read failed: {e}")));
            }
            Err(_) => {
                let _ = child.start_kill();
                return Err(PoolError::SpawnFailed("startup handshake timed out".into()));
            }
        }

        let pending = Arc::new(SyncMutex::new(Pending { results: HashMap::new(), health: Vec::new() }));

        let handle = Arc::new(Self {
            id: id.clone(),
            child: AsyncMutex::new(child),
            stdin: AsyncMutex::new(stdin),
            pending: Arc::clone(&pending),
            state: SyncMutex::new(WorkerState::Idle),
            request_count: AtomicU32::new(0),
            spawned_at: Instant::now(),
            healthy: AtomicBool::new(true),
            current_execution: SyncMutex::new(None),
            current_plugin: SyncMutex::new(None),
            reader: AsyncMutex::new(None),
        });

        let reader_pending = Arc::clone(&pending);
        let reader_handle = Arc::clone(&handle);
        let reader_id = id.clone();
        let reader_task = tokio::spawn(async move {
            let mut stdout = stdout;
            loop {
                match read_frame_async::<_, WorkerMessage>(&mut stdout).await {
                    Ok(WorkerMessage::Result { execution_id, output, operations, execution_time_ms }) => {
                        if let Some(tx) = reader_pending.lock().results.remove(&execution_id) {
                            let _ = tx.send(WorkerOutcome::Result { output, operations, execution_time_ms });
                        }
                    }
                    Ok(WorkerMessage::Error { execution_id, message, code }) => {
                        if let Some(tx) = reader_pending.lock().results.remove(&execution_id) {
                            let _ = tx.send(WorkerOutcome::HandlerError { code, message });
                        }
                    }
                    Ok(WorkerMessage::Health { healthy, requests_served, uptime_ms }) => {
                        let waiters = std::mem::take(&mut reader_pending.lock().health);
                        for tx in waiters {
                            let _ = tx.send((healthy, requests_served, uptime_ms));
                        }
                    }
                    Ok(WorkerMessage::Ready { .. }) => {
                        warn!(%reader_id, "unexpected duplicate ready handshake from worker");
                    }
                    Ok(WorkerMessage::Progress { .. }) | Ok(WorkerMessage::Event { .. }) => {
                        // Forwarding progress/events to the dispatcher's own
                        // tracker/bus is the embedder's concern; the pool
                        // only needs to keep reading so the pipe doesn't back up.
                    }
                    Err(e) => {
                        info!(%reader_id, error = %e, "worker stdout closed; treating as crash");
                        *reader_handle.state.lock() = WorkerState::Stopped;
                        reject_all_pending(&reader_pending);
                        break;
                    }
                }
            }
        });
        *handle.reader.lock().await = Some(reader_task);

        Ok(handle)
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: WorkerState) {
        *self.state.lock() = state;
    }

    /// Atomically claim this worker for execution if it is currently
    /// idle. Returns `false` (without side effects) for any other state.
    pub fn try_claim(&self) -> bool {
        let mut state = self.state.lock();
        if *state == WorkerState::Idle {
            *state = WorkerState::Busy;
            true
        } else {
            false
        }
    }

    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn uptime_ms(&self) -> u64 {
        self.spawned_at.elapsed().as_millis() as u64
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn current_plugin(&self) -> Option<PluginId> {
        self.current_plugin.lock().clone()
    }

    fn register_pending(&self, execution_id: ExecutionId) -> oneshot::Receiver<WorkerOutcome> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().results.insert(execution_id, tx);
        rx
    }

    async fn send(&self, message: &HostMessage) -> Result<(), PoolError> {
        let mut stdin = self.stdin.lock().await;
        write_frame_async(&mut *stdin, message)
            .await
            .map_err(|e| PoolError::SpawnFailed(format!("write to worker failed: {e}")))
    }

    /// Dispatch `execute` and return a receiver the caller can race
    /// against its own deadline/grace timers without losing the
    /// eventual reply (§4.6 steps 4-7).
    pub async fn begin_execute(
        &self,
        request: ExecutionRequest,
    ) -> Result<oneshot::Receiver<WorkerOutcome>, PoolError> {
        let execution_id = request.execution_id.clone();
        *self.current_execution.lock() = Some(execution_id.clone());
        *self.current_plugin.lock() = Some(request.plugin_id.clone());
        let rx = self.register_pending(execution_id.clone());
        self.send(&HostMessage::Execute { request: Box::new(request) }).await?;
        Ok(rx)
    }

    pub fn finish_execute(&self) {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        *self.current_execution.lock() = None;
        *self.current_plugin.lock() = None;
    }

    pub async fn abort(&self, execution_id: ExecutionId) {
        let _ = self.send(&HostMessage::Abort { execution_id }).await;
    }

    pub async fn health_check(&self, timeout_ms: u64) -> Result<(bool, u64, u64), PoolError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().health.push(tx);
        self.send(&HostMessage::HealthCheck).await?;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(reply)) => {
                self.healthy.store(reply.0, Ordering::SeqCst);
                Ok(reply)
            }
            _ => {
                self.healthy.store(false, Ordering::SeqCst);
                Err(PoolError::Timeout)
            }
        }
    }

    /// Graceful shutdown: ask the worker to finish its current
    /// execution and exit, then force-kill if it doesn't within
    /// `shutdownTimeoutMs`.
    pub async fn shutdown_gracefully(&self, grace_ms: u64) {
        *self.state.lock() = WorkerState::Draining;
        if self.send(&HostMessage::Shutdown { grace_ms }).await.is_err() {
            self.force_kill().await;
            return;
        }
        let deadline = tokio::time::Instant::now() + Duration::from_millis(grace_ms);
        let mut child = self.child.lock().await;
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let waited = tokio::time::timeout(remaining, child.wait()).await;
        if waited.is_err() {
            let _ = child.start_kill();
        }
        *self.state.lock() = WorkerState::Stopped;
    }

    pub async fn force_kill(&self) {
        let mut child = self.child.lock().await;
        let _ = child.start_kill();
        *self.state.lock() = WorkerState::Stopped;
        reject_all_pending(&self.pending);
    }
}

/// `shouldRecycle` (§4.6): true once a worker has served enough
/// requests, lived long enough, or failed a health check.
pub fn should_recycle(handle: &WorkerHandle, config: &PoolConfig) -> bool {
    handle.request_count() >= config.max_requests_per_worker
        || handle.uptime_ms() >= config.max_uptime_ms_per_worker
        || !handle.is_healthy()
}

pub fn new_worker_id() -> WorkerId {
    WorkerId::new(format!("w-{}", uuid::Uuid::new_v4()))
}
