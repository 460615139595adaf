//! Scoped pub/sub core: quotas, back-pressure, and graceful drain.
//!
//! Shared state (listeners, queue, dedup cache, rate-limit window) is
//! kept behind a `parking_lot::Mutex`; handler invocation always
//! happens after the lock is released, so a slow handler never blocks
//! another emitter from being admitted.
//!
//! `emit` only *admits* an envelope: it runs the permission, payload,
//! rate-limit, and dedup checks, pushes the envelope onto a
//! `maxQueueSize`-bounded per-scope queue (dropping per `dropPolicy` on
//! saturation), and returns. A single background dispatcher task per
//! scope (`dispatch_loop`, spawned in `EventBus::new`) drains that
//! queue and fans each envelope out to waiters/listeners — admission
//! and delivery are two different steps, so the queue actually bounds
//! in-flight events instead of being emptied by the same call that
//! filled it.

use crate::dedup::DedupCache;
use crate::error::{EventBusError, EventBusResult};
use crate::permissions::{can_consume, can_produce};
use pcore_protocol::{EventEnvelope, EventMeta, EventScope, EventsPermission};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Notify, Semaphore};
use tracing::{debug, warn};

pub type HandlerFn = Arc<dyn Fn(EventEnvelope) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPolicy {
    DropOldest,
    DropNew,
}

#[derive(Debug, Clone)]
pub struct EventBusConfig {
    pub max_payload_bytes: usize,
    pub events_per_minute: u32,
    pub max_listeners_per_topic: usize,
    pub max_queue_size: usize,
    pub drop_policy: DropPolicy,
    pub concurrent_handlers: usize,
    pub duplicate_ttl_ms: u64,
    pub dedup_cache_size: usize,
    pub shutdown_timeout_ms: u64,
    pub redact_keys: Vec<String>,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 256 * 1024,
            events_per_minute: 600,
            max_listeners_per_topic: 32,
            max_queue_size: 1024,
            drop_policy: DropPolicy::DropOldest,
            concurrent_handlers: 8,
            duplicate_ttl_ms: 60_000,
            dedup_cache_size: 4096,
            shutdown_timeout_ms: 5_000,
            redact_keys: vec![
                "authorization".into(),
                "apikey".into(),
                "token".into(),
                "password".into(),
                "secret".into(),
            ],
        }
    }
}

/// Each listener owns a dedicated unbounded channel drained by one
/// background task (spawned in `on`/`once`). Delivery is a non-blocking
/// send into this channel, never a spawn-per-event — that is what
/// keeps per-listener delivery order equal to emit order even when one
/// handler invocation is still running when the next event arrives.
struct ListenerEntry {
    id: u64,
    sender: mpsc::UnboundedSender<EventEnvelope>,
}

struct Waiter {
    predicate: Arc<dyn Fn(&EventEnvelope) -> bool + Send + Sync>,
    sender: Option<oneshot::Sender<EventEnvelope>>,
}

struct ScopeState {
    listeners: HashMap<String, Vec<ListenerEntry>>,
    queue: VecDeque<EventEnvelope>,
    dedup: DedupCache,
    rate_window: VecDeque<Instant>,
    waiters: HashMap<String, Vec<Waiter>>,
    draining: bool,
}

impl ScopeState {
    fn new(config: &EventBusConfig) -> Self {
        Self {
            listeners: HashMap::new(),
            queue: VecDeque::new(),
            dedup: DedupCache::new(config.dedup_cache_size, config.duplicate_ttl_ms),
            rate_window: VecDeque::new(),
            waiters: HashMap::new(),
            draining: false,
        }
    }
}

struct Inner {
    config: EventBusConfig,
    permissions: EventsPermission,
    local: parking_lot::Mutex<ScopeState>,
    plugin: parking_lot::Mutex<ScopeState>,
    next_listener_id: AtomicU64,
    /// `concurrentHandlers` caps simultaneously running handlers *per
    /// scope* (§4.4), so each scope gets its own semaphore rather than
    /// sharing one budget between `local` and `plugin`.
    local_handler_semaphore: Arc<Semaphore>,
    plugin_handler_semaphore: Arc<Semaphore>,
    /// Wakes this scope's `dispatch_loop` task after `emit` pushes an
    /// envelope onto a queue the task had drained to empty.
    local_queue_notify: Arc<Notify>,
    plugin_queue_notify: Arc<Notify>,
}

impl Inner {
    fn scope_state(&self, scope: EventScope) -> &parking_lot::Mutex<ScopeState> {
        match scope {
            EventScope::Local => &self.local,
            EventScope::Plugin => &self.plugin,
        }
    }

    fn scope_queue_notify(&self, scope: EventScope) -> &Arc<Notify> {
        match scope {
            EventScope::Local => &self.local_queue_notify,
            EventScope::Plugin => &self.plugin_queue_notify,
        }
    }
}

/// Pulls queued envelopes for one scope and fans each out to its
/// waiters/listeners, outside of `emit`'s call stack. Holds only a
/// `Weak<Inner>`, matching `pcore_pool`'s sweep-task convention, so it
/// exits once the last `EventBus` clone for this bus is dropped.
async fn dispatch_loop(weak: Weak<Inner>, scope: EventScope) {
    loop {
        let Some(inner) = weak.upgrade() else { return };
        loop {
            let next = inner.scope_state(scope.clone()).lock().queue.pop_front();
            match next {
                Some(envelope) => dispatch_one(&inner, scope.clone(), &envelope),
                None => break,
            }
        }
        let notify = Arc::clone(inner.scope_queue_notify(scope.clone()));
        drop(inner);
        // Bounded wait rather than an unconditional `notified().await`:
        // if a `notify_one` lands between the drain loop above finding
        // the queue empty and this call arming, the wait still self-heals
        // within this timeout instead of sleeping until the next emit.
        let _ = tokio::time::timeout(Duration::from_millis(200), notify.notified()).await;
    }
}

/// Fan one already-dequeued envelope out to matching waiters, then
/// listeners, under the scope's lock — mirrors the shape `emit` used to
/// run inline, just invoked from `dispatch_loop` instead.
fn dispatch_one(inner: &Inner, scope: EventScope, envelope: &EventEnvelope) {
    let mut state = inner.scope_state(scope).lock();

    if let Some(waiters) = state.waiters.get_mut(&envelope.topic) {
        waiters.retain_mut(|waiter| {
            if (waiter.predicate)(envelope) {
                if let Some(sender) = waiter.sender.take() {
                    let _ = sender.send(envelope.clone());
                }
                false
            } else {
                true
            }
        });
    }

    let Some(listeners) = state.listeners.get_mut(&envelope.topic) else { return };
    // A non-blocking send per listener; the listener's own drain task
    // (spawned in `on`) is what actually calls the handler, in the
    // order events land in its channel. A closed receiver means the
    // listener already unsubscribed itself (e.g. `once` firing its one
    // invocation) — harmless to ignore.
    for listener in listeners.iter() {
        let _ = listener.sender.send(envelope.clone());
    }
}

/// Token returned by `on`/`once`; dropping it does not unsubscribe —
/// call `dispose()` (or the bus's `off`) explicitly, matching the
/// explicit-dispose contract in the design.
pub struct Disposer {
    bus: EventBus,
    scope: EventScope,
    topic: String,
    id: u64,
}

impl Disposer {
    pub fn dispose(self) {
        self.bus.off(self.scope, &self.topic, self.id);
    }
}

#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

#[derive(Default, Clone)]
pub struct EmitOptions {
    pub scope: Option<EventScope>,
    pub idempotency_key: Option<String>,
    pub meta: Option<EventMeta>,
}

#[derive(Clone)]
pub struct OnOptions {
    pub scope: Option<EventScope>,
    pub max_invocations: Option<u32>,
}

impl Default for OnOptions {
    fn default() -> Self {
        Self { scope: Some(EventScope::Local), max_invocations: None }
    }
}

impl EventBus {
    pub fn new(config: EventBusConfig, permissions: EventsPermission) -> Self {
        let local_handler_semaphore = Arc::new(Semaphore::new(config.concurrent_handlers.max(1)));
        let plugin_handler_semaphore = Arc::new(Semaphore::new(config.concurrent_handlers.max(1)));
        let local = parking_lot::Mutex::new(ScopeState::new(&config));
        let plugin = parking_lot::Mutex::new(ScopeState::new(&config));
        let bus = Self {
            inner: Arc::new(Inner {
                config,
                permissions,
                local,
                plugin,
                next_listener_id: AtomicU64::new(1),
                local_handler_semaphore,
                plugin_handler_semaphore,
                local_queue_notify: Arc::new(Notify::new()),
                plugin_queue_notify: Arc::new(Notify::new()),
            }),
        };

        tokio::spawn(dispatch_loop(Arc::downgrade(&bus.inner), EventScope::Local));
        tokio::spawn(dispatch_loop(Arc::downgrade(&bus.inner), EventScope::Plugin));

        bus
    }

    fn scope_lock(&self, scope: EventScope) -> &parking_lot::Mutex<ScopeState> {
        self.inner.scope_state(scope)
    }

    fn handler_semaphore(&self, scope: EventScope) -> &Arc<Semaphore> {
        match scope {
            EventScope::Local => &self.inner.local_handler_semaphore,
            EventScope::Plugin => &self.inner.plugin_handler_semaphore,
        }
    }

    fn redact(&self, meta: &EventMeta) -> EventMeta {
        // Meta fields here are identifiers, not free-form key/value
        // pairs, so redaction is a no-op today; kept as the hook the
        // design calls for once meta grows arbitrary fields.
        let _ = &self.inner.config.redact_keys;
        meta.clone()
    }

    pub fn emit(
        &self,
        topic: &str,
        payload: serde_json::Value,
        opts: EmitOptions,
    ) -> EventBusResult<Option<EventEnvelope>> {
        let scope = opts.scope.unwrap_or(EventScope::Local);
        can_produce(&self.inner.permissions, scope.clone(), topic).map_err(EventBusError::PermissionDenied)?;

        let payload_bytes = serde_json::to_vec(&payload).unwrap_or_default().len();
        if payload_bytes > self.inner.config.max_payload_bytes {
            return Err(EventBusError::PayloadTooLarge {
                size: payload_bytes,
                max: self.inner.config.max_payload_bytes,
            });
        }

        let meta = self.redact(&opts.meta.unwrap_or_default());
        let trace_id_str = meta.trace_id.as_ref().map(|t| t.as_str().to_string());
        let scope_label = format!("{scope:?}");

        let mut state = self.scope_lock(scope.clone()).lock();
        if state.draining {
            return Err(EventBusError::ShuttingDown);
        }

        // Sliding 60s window for eventsPerMinute.
        let now = Instant::now();
        while matches!(state.rate_window.front(), Some(t) if now.duration_since(*t) > Duration::from_secs(60)) {
            state.rate_window.pop_front();
        }
        if state.rate_window.len() as u32 >= self.inner.config.events_per_minute {
            return Err(EventBusError::QuotaExceeded);
        }

        let dedup_key = DedupCache::key_for(
            opts.idempotency_key.as_deref(),
            topic,
            &scope_label,
            &payload,
            trace_id_str.as_deref(),
        );
        if state.dedup.check_and_record(&dedup_key) {
            debug!(topic, "plugin.events.duplicate_dropped");
            return Ok(None);
        }

        state.rate_window.push_back(now);

        let envelope = EventEnvelope {
            event_id: uuid::Uuid::new_v4().to_string(),
            idempotency_key: opts.idempotency_key,
            topic: topic.to_string(),
            scope: scope.clone(),
            ts: now_ms(),
            payload,
            meta,
        };

        if state.queue.len() >= self.inner.config.max_queue_size {
            match self.inner.config.drop_policy {
                DropPolicy::DropOldest => {
                    state.queue.pop_front();
                    state.queue.push_back(envelope.clone());
                    warn!(topic, reason = "queue_saturated", policy = "drop-oldest", "plugin.events.dropped");
                }
                DropPolicy::DropNew => {
                    warn!(topic, reason = "queue_saturated", policy = "drop-new", "plugin.events.dropped");
                    return Ok(Some(envelope));
                }
            }
        } else {
            state.queue.push_back(envelope.clone());
        }

        drop(state);
        self.inner.scope_queue_notify(scope).notify_one();
        Ok(Some(envelope))
    }

    pub fn on(&self, topic: &str, handler: HandlerFn, opts: OnOptions) -> EventBusResult<Disposer> {
        let scope = opts.scope.unwrap_or(EventScope::Local);
        can_consume(&self.inner.permissions, scope.clone(), topic).map_err(EventBusError::PermissionDenied)?;

        let mut state = self.scope_lock(scope.clone()).lock();
        let entries = state.listeners.entry(topic.to_string()).or_default();
        if entries.len() >= self.inner.config.max_listeners_per_topic {
            return Err(EventBusError::ListenerLimit(topic.to_string()));
        }
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel::<EventEnvelope>();
        entries.push(ListenerEntry { id, sender: tx });
        drop(state);

        let bus = self.clone();
        let scope_for_task = scope.clone();
        let topic_owned = topic.to_string();
        let max_invocations = opts.max_invocations;
        let semaphore = Arc::clone(self.handler_semaphore(scope.clone()));
        tokio::spawn(async move {
            let mut invocations = 0u32;
            while let Some(envelope) = rx.recv().await {
                let _permit = semaphore.acquire().await;
                handler(envelope).await;
                invocations += 1;
                if max_invocations.is_some_and(|max| invocations >= max) {
                    break;
                }
            }
            bus.off(scope_for_task, &topic_owned, id);
        });

        Ok(Disposer { bus: self.clone(), scope, topic: topic.to_string(), id })
    }

    pub fn once(&self, topic: &str, handler: HandlerFn, mut opts: OnOptions) -> EventBusResult<Disposer> {
        opts.max_invocations = Some(1);
        self.on(topic, handler, opts)
    }

    pub fn off(&self, scope: EventScope, topic: &str, listener_id: u64) {
        let mut state = self.scope_lock(scope).lock();
        if let Some(entries) = state.listeners.get_mut(topic) {
            entries.retain(|l| l.id != listener_id);
        }
    }

    pub async fn wait_for(
        &self,
        topic: &str,
        predicate: Arc<dyn Fn(&EventEnvelope) -> bool + Send + Sync>,
        scope: EventScope,
        timeout_ms: u64,
    ) -> EventBusResult<EventEnvelope> {
        can_consume(&self.inner.permissions, scope.clone(), topic).map_err(EventBusError::PermissionDenied)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.scope_lock(scope).lock();
            state.waiters.entry(topic.to_string()).or_default().push(Waiter {
                predicate,
                sender: Some(tx),
            });
        }

        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(envelope)) => Ok(envelope),
            _ => Err(EventBusError::Timeout(topic.to_string())),
        }
    }

    /// Stop admitting new events and wait up to `shutdownTimeoutMs`
    /// for anything already dispatched to finish, then clear all
    /// listeners, queues, and waiters.
    pub async fn shutdown(&self) {
        for scope in [EventScope::Local, EventScope::Plugin] {
            let mut state = self.scope_lock(scope).lock();
            state.draining = true;
        }
        tokio::time::sleep(Duration::from_millis(self.inner.config.shutdown_timeout_ms)).await;
        for scope in [EventScope::Local, EventScope::Plugin] {
            let mut state = self.scope_lock(scope).lock();
            state.listeners.clear();
            state.queue.clear();
            state.waiters.clear();
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn permissive_permissions() -> EventsPermission {
        EventsPermission {
            produce: vec!["plugin.*".into()],
            consume: vec!["plugin.*".into()],
            scopes: vec![EventScope::Local, EventScope::Plugin],
        }
    }

    #[tokio::test]
    async fn listener_receives_emitted_event() {
        let bus = EventBus::new(EventBusConfig::default(), permissive_permissions());
        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = Arc::clone(&received);
        let handler: HandlerFn = Arc::new(move |_env| {
            let received = Arc::clone(&received_clone);
            Box::pin(async move {
                received.fetch_add(1, Ordering::SeqCst);
            })
        });
        bus.on("plugin.formatter.done", handler, OnOptions::default()).unwrap();
        bus.emit("plugin.formatter.done", serde_json::json!({"ok": true}), EmitOptions::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_is_dropped() {
        let bus = EventBus::new(EventBusConfig::default(), permissive_permissions());
        let opts = EmitOptions { idempotency_key: Some("k1".into()), ..Default::default() };
        let first = bus.emit("plugin.a", serde_json::json!({}), opts.clone()).unwrap();
        let second = bus.emit("plugin.a", serde_json::json!({}), opts).unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn payload_too_large_is_rejected() {
        let mut config = EventBusConfig::default();
        config.max_payload_bytes = 4;
        let bus = EventBus::new(config, permissive_permissions());
        let err = bus.emit("plugin.a", serde_json::json!({"x": "too big"}), EmitOptions::default()).unwrap_err();
        assert!(matches!(err, EventBusError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn unpermitted_topic_denied() {
        let perm = EventsPermission { produce: vec!["plugin.only".into()], consume: vec![], scopes: vec![EventScope::Local] };
        let bus = EventBus::new(EventBusConfig::default(), perm);
        let err = bus.emit("plugin.other", serde_json::json!({}), EmitOptions::default()).unwrap_err();
        assert!(matches!(err, EventBusError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn wait_for_resolves_on_matching_emit() {
        let bus = EventBus::new(EventBusConfig::default(), permissive_permissions());
        let bus_clone = bus.clone();
        let waiter = tokio::spawn(async move {
            bus_clone
                .wait_for("plugin.ready", Arc::new(|_e| true), EventScope::Local, 1000)
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        bus.emit("plugin.ready", serde_json::json!({"go": true}), EmitOptions::default()).unwrap();
        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result.topic, "plugin.ready");
    }

    #[tokio::test]
    async fn wait_for_times_out_without_emit() {
        let bus = EventBus::new(EventBusConfig::default(), permissive_permissions());
        let result = bus.wait_for("plugin.never", Arc::new(|_e| true), EventScope::Local, 50).await;
        assert!(matches!(result, Err(EventBusError::Timeout(_))));
    }

    #[tokio::test]
    async fn once_unsubscribes_after_first_invocation() {
        let bus = EventBus::new(EventBusConfig::default(), permissive_permissions());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let handler: HandlerFn = Arc::new(move |_env| {
            let count = Arc::clone(&count_clone);
            Box::pin(async move {
                count.fetch_add(1, Ordering::SeqCst);
            })
        });
        bus.once("plugin.once", handler, OnOptions::default()).unwrap();
        bus.emit("plugin.once", serde_json::json!({}), EmitOptions::default()).unwrap();
        bus.emit("plugin.once", serde_json::json!({}), EmitOptions::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn listener_observes_emit_order_even_when_first_handler_is_slow() {
        let bus = EventBus::new(EventBusConfig::default(), permissive_permissions());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let order_clone = Arc::clone(&order);
        let handler: HandlerFn = Arc::new(move |env| {
            let order = Arc::clone(&order_clone);
            Box::pin(async move {
                let n = env.payload["n"].as_u64().unwrap();
                if n == 1 {
                    // The first event's handler is deliberately slow; if
                    // delivery spawned a task per event this could let
                    // event 2's handler finish first.
                    tokio::time::sleep(Duration::from_millis(30)).await;
                }
                order.lock().push(n);
            })
        });
        bus.on("plugin.ordering", handler, OnOptions::default()).unwrap();
        bus.emit("plugin.ordering", serde_json::json!({"n": 1}), EmitOptions::default()).unwrap();
        bus.emit("plugin.ordering", serde_json::json!({"n": 2}), EmitOptions::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn queue_saturation_drops_new_event_without_delivery() {
        let config = EventBusConfig { max_queue_size: 1, drop_policy: DropPolicy::DropNew, ..EventBusConfig::default() };
        let bus = EventBus::new(config, permissive_permissions());
        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = Arc::clone(&received);
        let handler: HandlerFn = Arc::new(move |_env| {
            let received = Arc::clone(&received_clone);
            Box::pin(async move {
                received.fetch_add(1, Ordering::SeqCst);
            })
        });
        bus.on("plugin.a", handler, OnOptions::default()).unwrap();

        // No `.await` between these two emits: on the current-thread
        // test runtime, the background dispatch task can't run in
        // between, so the second emit finds the size-1 queue still
        // holding the first envelope and is dropped per `DropNew`
        // instead of ever reaching the listener.
        bus.emit("plugin.a", serde_json::json!({"n": 1}), EmitOptions::default()).unwrap();
        bus.emit("plugin.a", serde_json::json!({"n": 2}), EmitOptions::default()).unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn queue_saturation_drop_oldest_replaces_pending_envelope() {
        let config = EventBusConfig { max_queue_size: 1, drop_policy: DropPolicy::DropOldest, ..EventBusConfig::default() };
        let bus = EventBus::new(config, permissive_permissions());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let handler: HandlerFn = Arc::new(move |env| {
            let seen = Arc::clone(&seen_clone);
            Box::pin(async move {
                seen.lock().push(env.payload["n"].as_u64().unwrap());
            })
        });
        bus.on("plugin.a", handler, OnOptions::default()).unwrap();

        // Same race-free setup as the drop-new test above, but here the
        // still-queued first envelope is evicted in favour of the
        // second rather than the second being discarded.
        bus.emit("plugin.a", serde_json::json!({"n": 1}), EmitOptions::default()).unwrap();
        bus.emit("plugin.a", serde_json::json!({"n": 2}), EmitOptions::default()).unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[tokio::test]
    async fn shutdown_clears_listeners() {
        let bus = EventBus::new(
            EventBusConfig { shutdown_timeout_ms: 10, ..Default::default() },
            permissive_permissions(),
        );
        let handler: HandlerFn = Arc::new(|_env| Box::pin(async {}));
        bus.on("plugin.a", handler, OnOptions::default()).unwrap();
        bus.shutdown().await;
        let err = bus.emit("plugin.a", serde_json::json!({}), EmitOptions::default()).unwrap_err();
        assert!(matches!(err, EventBusError::ShuttingDown));
    }
}
