//! Worker-pool backend (C6): admission, scheduling, recycling,
//! warm-up, and health of a set of `pcore-worker` child processes.
//!
//! Grounded on the teacher's `Sentinel`/`ConnectedWorker` shape
//! (`cleanup_stale_workers`, `assign_job`, `check_circuit_breaker`),
//! generalised from a ZMQ-routed file-processing job queue to
//! permission-scoped plugin handler invocations dispatched over the
//! stdio wire protocol instead of ZMQ sockets.

mod config;
mod error;
mod worker;

pub use config::{PoolConfig, WarmupConfig, WarmupMode};
pub use error::{parse_error_code, PoolError};
pub use worker::{new_worker_id, WorkerHandle, WorkerOutcome, WorkerState};

use parking_lot::Mutex;
use pcore_errors::ErrorEnvelope;
use pcore_ids::{ExecutionId, PluginId, WorkerId};
use pcore_protocol::ExecutionRequest;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tracing::{info, warn};

/// What `execute` hands back on success: the handler's own envelope
/// fields, already shed of pool bookkeeping.
#[derive(Debug, Clone)]
pub struct PoolExecuteOutcome {
    pub output: serde_json::Value,
    pub operations: Vec<pcore_protocol::OperationRecord>,
    pub execution_time_ms: u64,
}

/// Per-plugin concurrency admission (§3 "Worker pool" — "FIFO wait
/// queue of admission-blocked requests"). `counts` tracks slots
/// currently in use; `waiters` is an ordered queue of tickets so a
/// freed slot is handed to whichever blocked request arrived first,
/// rather than waking every blocked request to race for it.
struct PluginAdmission {
    counts: HashMap<PluginId, u32>,
    waiters: HashMap<PluginId, VecDeque<(u64, oneshot::Sender<()>)>>,
    next_ticket: u64,
}

impl PluginAdmission {
    fn new() -> Self {
        Self { counts: HashMap::new(), waiters: HashMap::new(), next_ticket: 0 }
    }
}

struct Inner {
    config: PoolConfig,
    workers: Mutex<HashMap<WorkerId, Arc<WorkerHandle>>>,
    plugin_admission: Mutex<PluginAdmission>,
    notify: Notify,
    draining: AtomicBool,
}

/// The worker-pool execution backend. Cheap to clone — every clone
/// shares the same worker set and admission counters.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<Inner>,
}

impl WorkerPool {
    /// Build a pool and, per `warmup.mode`, either spawn `min` workers
    /// immediately (`eager`) or leave the pool empty until the first
    /// `execute` call (`lazy`). Also starts a background sweep task
    /// that recycles due workers and prunes crashed ones; the task
    /// holds only a `Weak` reference so it exits once every clone of
    /// the pool (and the one returned here) is dropped.
    pub async fn start(config: PoolConfig) -> Self {
        let pool = Self {
            inner: Arc::new(Inner {
                config,
                workers: Mutex::new(HashMap::new()),
                plugin_admission: Mutex::new(PluginAdmission::new()),
                notify: Notify::new(),
                draining: AtomicBool::new(false),
            }),
        };

        if matches!(pool.inner.config.warmup.mode, WarmupMode::Eager) {
            for _ in 0..pool.inner.config.min {
                if let Err(e) = pool.spawn_and_insert().await {
                    warn!(error = %e, "eager warm-up failed to spawn a worker");
                }
            }
        }

        let weak = Arc::downgrade(&pool.inner);
        tokio::spawn(async move { sweep_loop(weak).await });

        pool
    }

    pub fn worker_count(&self) -> usize {
        self.inner.workers.lock().len()
    }

    async fn spawn_and_insert(&self) -> Result<Arc<WorkerHandle>, PoolError> {
        let id = new_worker_id();
        let handle = WorkerHandle::spawn(id.clone(), &self.inner.config).await?;
        self.inner.workers.lock().insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Admission for the per-plugin concurrency cap (§4.6 step 2).
    /// `max_concurrent_per_plugin = None` is read as "unlimited,
    /// bounded only by the pool's global `max`" — see DESIGN.md for
    /// why this reading was picked over "inherit pool default".
    ///
    /// A request that finds the plugin's slots full takes a ticket in
    /// `PluginAdmission::waiters` and waits on its own oneshot — when a
    /// slot frees, `release_plugin_slot` hands it directly to the
    /// oldest ticket instead of waking every blocked request to race
    /// for the freed count, giving the §3/§8 "FIFO wait queue"/"FIFO
    /// fairness within the per-plugin queue" its ordering guarantee.
    async fn admit_plugin_slot(&self, plugin_id: &PluginId, deadline: tokio::time::Instant) -> Result<(), PoolError> {
        let Some(limit) = self.inner.config.max_concurrent_per_plugin else {
            return Ok(());
        };

        let (ticket, rx) = {
            let mut admission = self.inner.plugin_admission.lock();
            let current = admission.counts.entry(plugin_id.clone()).or_insert(0);
            if *current < limit {
                *current += 1;
                return Ok(());
            }
            if deadline.saturating_duration_since(tokio::time::Instant::now()).is_zero() {
                return Err(PoolError::Timeout);
            }
            let ticket = admission.next_ticket;
            admission.next_ticket += 1;
            let (tx, rx) = oneshot::channel();
            admission.waiters.entry(plugin_id.clone()).or_default().push_back((ticket, tx));
            (ticket, rx)
        };

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(PoolError::Timeout),
            Err(_) => {
                self.cancel_plugin_wait(plugin_id, ticket);
                Err(PoolError::Timeout)
            }
        }
    }

    /// Remove a timed-out ticket from the wait queue so it can never be
    /// handed a slot later (a slot freed just after the timeout would
    /// otherwise be silently consumed by an abandoned waiter).
    fn cancel_plugin_wait(&self, plugin_id: &PluginId, ticket: u64) {
        let mut admission = self.inner.plugin_admission.lock();
        if let Some(queue) = admission.waiters.get_mut(plugin_id) {
            queue.retain(|(id, _)| *id != ticket);
        }
    }

    fn release_plugin_slot(&self, plugin_id: &PluginId) {
        if self.inner.config.max_concurrent_per_plugin.is_none() {
            return;
        }
        let mut admission = self.inner.plugin_admission.lock();
        if let Some(queue) = admission.waiters.get_mut(plugin_id) {
            while let Some((_, sender)) = queue.pop_front() {
                // Hand the slot straight to the oldest waiter; the
                // count stays unchanged since ownership transferred
                // without ever being released. A failed send means
                // that waiter already gave up (timed out) — try the
                // next ticket instead of freeing the slot early.
                if sender.send(()).is_ok() {
                    return;
                }
            }
        }
        if let Some(current) = admission.counts.get_mut(plugin_id) {
            *current = current.saturating_sub(1);
        }
    }

    /// Find an idle worker and claim it, spawning a fresh one if the
    /// pool has room, or wait for one to free up (§4.6 step 3).
    async fn acquire_worker(&self, deadline: tokio::time::Instant) -> Result<Arc<WorkerHandle>, PoolError> {
        loop {
            if self.inner.draining.load(Ordering::SeqCst) {
                return Err(PoolError::NotAvailable);
            }
            let claimed = {
                let workers = self.inner.workers.lock();
                workers.values().find(|w| w.try_claim()).cloned()
            };
            if let Some(worker) = claimed {
                return Ok(worker);
            }

            let below_max = self.inner.workers.lock().len() < self.inner.config.max;
            if below_max {
                match self.spawn_and_insert().await {
                    Ok(worker) => {
                        // spawn_and_insert leaves the worker Idle; claim it
                        // for this caller before anyone else can race it.
                        if worker.try_claim() {
                            return Ok(worker);
                        }
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to spawn worker on demand");
                    }
                }
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(PoolError::Timeout);
            }
            let _ = tokio::time::timeout(remaining, self.inner.notify.notified()).await;
        }
    }

    /// `execute(request, timeoutMs)` — the pool's public admission and
    /// dispatch entry point (§4.6).
    pub async fn execute(&self, request: ExecutionRequest, timeout_ms: u64) -> Result<PoolExecuteOutcome, PoolError> {
        if self.inner.draining.load(Ordering::SeqCst) {
            return Err(PoolError::NotAvailable);
        }

        let overall_deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        let plugin_id = request.plugin_id.clone();
        self.admit_plugin_slot(&plugin_id, overall_deadline).await?;

        let worker = match self.acquire_worker(overall_deadline).await {
            Ok(w) => w,
            Err(e) => {
                self.release_plugin_slot(&plugin_id);
                return Err(e);
            }
        };

        let result = self.drive_execution(&worker, request, timeout_ms).await;
        self.release_plugin_slot(&plugin_id);
        result
    }

    async fn drive_execution(
        &self,
        worker: &Arc<WorkerHandle>,
        request: ExecutionRequest,
        timeout_ms: u64,
    ) -> Result<PoolExecuteOutcome, PoolError> {
        let execution_id = request.execution_id.clone();
        let mut rx = match worker.begin_execute(request).await {
            Ok(rx) => rx,
            Err(e) => {
                worker.set_state(WorkerState::Idle);
                self.inner.notify.notify_waiters();
                return Err(e);
            }
        };

        let sleep_to_deadline = tokio::time::sleep(Duration::from_millis(timeout_ms));
        tokio::pin!(sleep_to_deadline);

        let outcome = tokio::select! {
            res = &mut rx => res,
            _ = &mut sleep_to_deadline => {
                return self.handle_timeout(worker, execution_id, rx).await;
            }
        };

        self.finish_normally(worker, outcome)
    }

    async fn handle_timeout(
        &self,
        worker: &Arc<WorkerHandle>,
        execution_id: ExecutionId,
        mut rx: tokio::sync::oneshot::Receiver<WorkerOutcome>,
    ) -> Result<PoolExecuteOutcome, PoolError> {
        worker.abort(execution_id).await;
        let grace = tokio::time::sleep(Duration::from_millis(self.inner.config.abort_grace_ms));
        tokio::pin!(grace);

        tokio::select! {
            res = &mut rx => {
                info!(worker_id = %worker.id, "worker completed late, within abort grace window");
                let _ = self.finish_normally(worker, res);
            }
            _ = &mut grace => {
                warn!(worker_id = %worker.id, "worker did not honour abort within grace window; force-killing");
                worker.force_kill().await;
                self.retire_worker(&worker.id);
                self.spawn_replacement_if_below_min().await;
            }
        }
        self.inner.notify.notify_waiters();
        Err(PoolError::Timeout)
    }

    fn finish_normally(
        &self,
        worker: &Arc<WorkerHandle>,
        outcome: Result<WorkerOutcome, tokio::sync::oneshot::error::RecvError>,
    ) -> Result<PoolExecuteOutcome, PoolError> {
        worker.finish_execute();
        match outcome {
            Ok(WorkerOutcome::Result { output, operations, execution_time_ms }) => {
                self.conclude_worker_turn(worker);
                Ok(PoolExecuteOutcome { output, operations, execution_time_ms })
            }
            Ok(WorkerOutcome::HandlerError { code, message }) => {
                self.conclude_worker_turn(worker);
                Err(PoolError::Handler { code: parse_error_code(&code), message })
            }
            Err(_recv_error) => {
                // The reader task dropped every pending sender when it
                // saw stdin close — the process died mid-execution.
                self.retire_worker(&worker.id);
                Err(PoolError::WorkerCrashed)
            }
        }
    }

    /// Return the worker to `idle` (or recycle it) now that its turn
    /// is over, and wake anyone waiting for a slot.
    fn conclude_worker_turn(&self, worker: &Arc<WorkerHandle>) {
        if worker::should_recycle(worker, &self.inner.config) {
            let pool = self.clone();
            let worker = Arc::clone(worker);
            tokio::spawn(async move { pool.recycle(worker).await });
        } else {
            worker.set_state(WorkerState::Idle);
        }
        self.inner.notify.notify_waiters();
    }

    /// Recycle policy (§4.6): drain the worker gracefully, remove it,
    /// and start a replacement if the pool has dropped below `min`.
    async fn recycle(&self, worker: Arc<WorkerHandle>) {
        info!(worker_id = %worker.id, requests = worker.request_count(), uptime_ms = worker.uptime_ms(), "recycling worker");
        worker.shutdown_gracefully(self.inner.config.shutdown_timeout_ms).await;
        self.retire_worker(&worker.id);
        self.spawn_replacement_if_below_min().await;
    }

    fn retire_worker(&self, id: &WorkerId) {
        self.inner.workers.lock().remove(id);
        self.inner.notify.notify_waiters();
    }

    async fn spawn_replacement_if_below_min(&self) {
        if self.inner.draining.load(Ordering::SeqCst) {
            return;
        }
        if self.inner.workers.lock().len() < self.inner.config.min {
            if let Err(e) = self.spawn_and_insert().await {
                warn!(error = %e, "failed to respawn worker to maintain pool minimum");
            } else {
                self.inner.notify.notify_waiters();
            }
        }
    }

    /// Periodic or on-demand health check of every idle worker,
    /// recycling any that fail to answer within `healthCheckTimeoutMs`.
    pub async fn run_health_sweep(&self) {
        let idle_workers: Vec<Arc<WorkerHandle>> = {
            let workers = self.inner.workers.lock();
            workers.values().filter(|w| w.state() == WorkerState::Idle).cloned().collect()
        };
        for worker in idle_workers {
            let timeout_ms = self.inner.config.health_check_timeout_ms;
            if worker.health_check(timeout_ms).await.is_err() {
                warn!(worker_id = %worker.id, "health check failed; recycling");
                if worker.try_claim() {
                    let pool = self.clone();
                    tokio::spawn(async move { pool.recycle(worker).await });
                }
            }
        }
    }

    /// Recycle any *idle* worker that has crossed `maxRequestsPerWorker`
    /// or `maxUptimeMsPerWorker` even though nothing is currently
    /// executing on it — `conclude_worker_turn` only checks this right
    /// after a turn, so a worker that goes idle and then sits unused
    /// still needs this periodic sweep to be retired on schedule.
    async fn recycle_due_idle_workers(&self) {
        let due: Vec<Arc<WorkerHandle>> = {
            let workers = self.inner.workers.lock();
            workers
                .values()
                .filter(|w| w.state() == WorkerState::Idle && worker::should_recycle(w, &self.inner.config))
                .cloned()
                .collect()
        };
        for worker in due {
            if worker.try_claim() {
                let pool = self.clone();
                tokio::spawn(async move { pool.recycle(worker).await });
            }
        }
    }

    /// `shutdown`: stop admitting new executions and drain every
    /// worker gracefully.
    pub async fn shutdown(&self) {
        self.inner.draining.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
        let workers: Vec<Arc<WorkerHandle>> = self.inner.workers.lock().values().cloned().collect();
        let grace = self.inner.config.shutdown_timeout_ms;
        let shutdowns = workers.iter().map(|w| w.shutdown_gracefully(grace));
        futures_join_all(shutdowns).await;
        self.inner.workers.lock().clear();
    }
}

/// Small local stand-in for `futures::future::join_all` so the crate
/// doesn't need the `futures` crate for one call site.
async fn futures_join_all<F: std::future::Future<Output = ()>>(futures: impl Iterator<Item = F>) {
    let handles: Vec<_> = futures.collect();
    for f in handles {
        f.await;
    }
}

/// Background task started by [`WorkerPool::start`]: periodically
/// health-checks idle workers and recycles any that are due, using
/// only a `Weak` handle so the task exits once the last `WorkerPool`
/// clone is dropped rather than keeping the pool alive forever.
async fn sweep_loop(weak: Weak<Inner>) {
    loop {
        let interval_ms = match weak.upgrade() {
            Some(inner) => inner.config.health_check_interval_ms,
            None => return,
        };
        tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        let Some(inner) = weak.upgrade() else { return };
        let pool = WorkerPool { inner };
        pool.run_health_sweep().await;
        pool.recycle_due_idle_workers().await;
    }
}

impl From<PoolError> for ErrorEnvelope {
    fn from(err: PoolError) -> Self {
        err.into_envelope()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcore_protocol::{ChainLimits, HandlerRef, HostContext, Permissions, Quotas};

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

    #[test]
    fn sample_request_builds_without_worker_process() {
        // The rest of this module's behaviour requires a real
        // `pcore-worker` binary on disk, which unit tests in this
        // crate don't spawn (that's covered by the integration test
        // under tests/ with a fake worker binary). This smoke test
        // only pins down that the request type used throughout is
        // constructible the way the pool expects.
        let request = sample_request("acme/formatter");
        assert_eq!(request.plugin_id, PluginId::from("acme/formatter"));
    }

    fn admission_only_pool(max_concurrent_per_plugin: Option<u32>) -> WorkerPool {
        // Built by hand instead of through `start()` so this test
        // never spawns a real worker process or the sweep task —
        // admission/release only ever touch `plugin_admission`.
        WorkerPool {
            inner: Arc::new(Inner {
                config: PoolConfig { max_concurrent_per_plugin, ..PoolConfig::default() },
                workers: Mutex::new(HashMap::new()),
                plugin_admission: Mutex::new(PluginAdmission::new()),
                notify: Notify::new(),
                draining: AtomicBool::new(false),
            }),
        }
    }

    #[tokio::test]
    async fn plugin_admission_grants_slots_in_arrival_order() {
        let pool = admission_only_pool(Some(1));
        let plugin = PluginId::from("acme/formatter");
        let far_future = tokio::time::Instant::now() + Duration::from_secs(10);

        // Hold the only slot so the next three callers all have to wait.
        pool.admit_plugin_slot(&plugin, far_future).await.unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..3u32 {
            let pool = pool.clone();
            let plugin = plugin.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                pool.admit_plugin_slot(&plugin, far_future).await.unwrap();
                order.lock().push(i);
                pool.release_plugin_slot(&plugin);
            }));
            // Give each waiter a chance to take its ticket before the
            // next one spawns, so tickets land in spawn order 0, 1, 2
            // instead of racing for the lock.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        pool.release_plugin_slot(&plugin);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }
}
