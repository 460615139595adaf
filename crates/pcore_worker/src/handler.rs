//! Pluggable handler loading and the context bundle a handler is
//! invoked with: the frozen execution context plus the sandboxed
//! collaborators built for this one request (§4.5 step 3-4).

use pcore_artifacts::{ArtifactBroker, ArtifactResult, ArtifactUri, WriteOptions, WriteOutcome};
use pcore_context::ExecutionContext;
use pcore_errors::{ErrorCode, ErrorEnvelope};
use pcore_events::{Disposer, EmitOptions, EventBus, EventBusResult, HandlerFn, OnOptions};
use pcore_ids::PluginId;
use pcore_protocol::{
    ArtifactMeta, ArtifactReadEntry, ArtifactStatus, ArtifactWriteEntry, EventEnvelope, HandlerRef,
};
use pcore_runtime::{EnvAccessor, FsShim, HttpClient, Logger};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Artifact access scoped to the plugin executing the current
/// request: binds the caller id and the granted `artifacts.read`/
/// `artifacts.write` entries, so a handler only ever sees `read`/
/// `write` taking a URI and bytes.
pub struct ArtifactClient {
    broker: Arc<ArtifactBroker>,
    self_id: PluginId,
    read_entries: Vec<ArtifactReadEntry>,
    write_entries: Vec<ArtifactWriteEntry>,
}

impl ArtifactClient {
    pub fn new(
        broker: Arc<ArtifactBroker>,
        self_id: PluginId,
        read_entries: Vec<ArtifactReadEntry>,
        write_entries: Vec<ArtifactWriteEntry>,
    ) -> Self {
        Self { broker, self_id, read_entries, write_entries }
    }

    pub async fn write(&self, uri: &ArtifactUri, data: &[u8], opts: WriteOptions) -> ArtifactResult<WriteOutcome> {
        self.broker
            .write(uri, data, self.self_id.clone(), &self.write_entries, &self.self_id, opts)
            .await
    }

    pub async fn read(&self, uri: &ArtifactUri, accept: Option<&[String]>) -> ArtifactResult<(Vec<u8>, ArtifactMeta)> {
        self.broker.read(uri, &self.read_entries, accept, &self.self_id).await
    }

    pub async fn list(
        &self,
        plugin_id: &PluginId,
        pattern: &str,
        status_filter: Option<&[ArtifactStatus]>,
        min_version: Option<&str>,
    ) -> ArtifactResult<Vec<(String, ArtifactMeta)>> {
        self.broker.list(plugin_id, pattern, status_filter, min_version).await
    }

    pub async fn wait_for(&self, uri: &ArtifactUri, timeout_ms: u64) -> ArtifactResult<ArtifactMeta> {
        self.broker.wait_for(uri, timeout_ms).await
    }
}

/// Event bus access scoped to the current request. The bus itself
/// already enforces `events.produce`/`events.consume` per call, so
/// this is just a cheaply-clonable handle.
#[derive(Clone)]
pub struct EventsClient {
    bus: EventBus,
}

impl EventsClient {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn emit(&self, topic: &str, payload: serde_json::Value, opts: EmitOptions) -> EventBusResult<Option<EventEnvelope>> {
        self.bus.emit(topic, payload, opts)
    }

    pub fn on(&self, topic: &str, handler: HandlerFn, opts: OnOptions) -> EventBusResult<Disposer> {
        self.bus.on(topic, handler, opts)
    }

    pub async fn wait_for(
        &self,
        topic: &str,
        predicate: Arc<dyn Fn(&EventEnvelope) -> bool + Send + Sync>,
        scope: pcore_protocol::EventScope,
        timeout_ms: u64,
    ) -> EventBusResult<EventEnvelope> {
        self.bus.wait_for(topic, predicate, scope, timeout_ms).await
    }
}

/// Everything a handler is invoked with besides its `input`.
pub struct HandlerContext {
    pub execution: ExecutionContext,
    pub fs: FsShim,
    pub env: EnvAccessor,
    pub http: HttpClient,
    pub logger: Logger,
    pub artifacts: ArtifactClient,
    pub events: EventsClient,
}

pub type HandlerResult = Result<serde_json::Value, ErrorEnvelope>;
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// A loaded plugin handler: `(input, context)` in, data or a typed
/// error out (§4.5 step 4).
pub trait Handler: Send + Sync {
    fn call(&self, input: serde_json::Value, context: Arc<HandlerContext>) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(serde_json::Value, Arc<HandlerContext>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, input: serde_json::Value, context: Arc<HandlerContext>) -> HandlerFuture {
        Box::pin(self(input, context))
    }
}

/// Loads a handler module given the plugin's root directory and a
/// `(file, export)` reference. The actual dynamic loading mechanism —
/// a dynamic library, an embedded interpreter, whatever an embedding
/// host wires in — is the opaque collaborator this crate never
/// implements; this trait is the seam an embedder supplies instead.
pub trait HandlerLoader: Send + Sync {
    fn load(&self, plugin_root: &str, handler_ref: &HandlerRef) -> Result<Arc<dyn Handler>, ErrorEnvelope>;
}

fn handler_not_found(handler_ref: &HandlerRef) -> ErrorEnvelope {
    ErrorEnvelope::builder(
        ErrorCode::HandlerNotFound,
        format!("no handler registered for {}#{}", handler_ref.file, handler_ref.export),
    )
    .fix("register the handler with the loader before dispatching, or check handlerRef for typos")
    .build()
}

/// Default loader used in tests and by embedders that resolve
/// handlers ahead of time: a static in-memory registry keyed by
/// `(file, export)`.
#[derive(Clone, Default)]
pub struct StaticHandlerRegistry {
    handlers: HashMap<(String, String), Arc<dyn Handler>>,
}

impl StaticHandlerRegistry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    pub fn register(mut self, file: impl Into<String>, export: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.handlers.insert((file.into(), export.into()), handler);
        self
    }
}

impl HandlerLoader for StaticHandlerRegistry {
    fn load(&self, _plugin_root: &str, handler_ref: &HandlerRef) -> Result<Arc<dyn Handler>, ErrorEnvelope> {
        self.handlers
            .get(&(handler_ref.file.clone(), handler_ref.export.clone()))
            .cloned()
            .ok_or_else(|| handler_not_found(handler_ref))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_registry_loads_registered_handler() {
        let registry = StaticHandlerRegistry::new().register(
            "index.js",
            "run",
            Arc::new(|input: serde_json::Value, _ctx: Arc<HandlerContext>| async move { Ok(input) }),
        );
        let handler_ref = HandlerRef { file: "index.js".into(), export: "run".into() };
        assert!(registry.load("/plugins/formatter", &handler_ref).is_ok());
    }

    #[test]
    fn static_registry_reports_handler_not_found() {
        let registry = StaticHandlerRegistry::new();
        let handler_ref = HandlerRef { file: "missing.js".into(), export: "run".into() };
        let err = registry.load("/plugins/formatter", &handler_ref).unwrap_err();
        assert_eq!(err.code, ErrorCode::HandlerNotFound);
    }
}
