//! The dispatch pipeline itself (§4.7 "Dispatch pipeline"): capability
//! check, schema validation on the way in and out, backend handoff,
//! declared-artifact write-back, and result envelope assembly.

use crate::backend::{BackendError, ExecutionBackend};
use crate::error::DispatchError;
use crate::manifest::{find_declared_artifact_key, HandlerManifest};
use crate::schema;
use pcore_artifacts::{ArtifactBroker, WriteOptions};
use pcore_errors::ErrorEnvelope;
use pcore_protocol::ExecutionRequest;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// What a request needs beyond the wire-level [`ExecutionRequest`]: the
/// handler's declared manifest and the deadline to enforce.
pub struct DispatchArgs {
    pub request: ExecutionRequest,
    pub manifest: HandlerManifest,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionMetrics {
    pub time_ms: u64,
}

/// `{ok:true, data, metrics, ...}` or `{ok:false, error, metrics, ...}`
/// (§4.7 step 8). `logs`/`profile` are left for an embedder to attach;
/// this crate never produces either.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionEnvelope {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    pub metrics: ExecutionMetrics,
}

impl ExecutionEnvelope {
    fn ok(data: Value, time_ms: u64) -> Self {
        Self { ok: true, data: Some(data), error: None, metrics: ExecutionMetrics { time_ms } }
    }

    fn err(error: ErrorEnvelope, time_ms: u64) -> Self {
        Self { ok: false, data: None, error: Some(error), metrics: ExecutionMetrics { time_ms } }
    }
}

/// Ties a chosen [`ExecutionBackend`] to the artifact broker the
/// write-back step (§4.7 step 7) publishes through. One dispatcher per
/// backend/broker pair; an embedder that serves more than one backend
/// mode builds one of these per mode.
pub struct Dispatcher {
    backend: Arc<dyn ExecutionBackend>,
    artifact_broker: Arc<ArtifactBroker>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn ExecutionBackend>, artifact_broker: Arc<ArtifactBroker>) -> Self {
        Self { backend, artifact_broker }
    }

    pub async fn execute(&self, args: DispatchArgs) -> ExecutionEnvelope {
        let started = Instant::now();
        match self.run_pipeline(args).await {
            Ok(data) => ExecutionEnvelope::ok(data, started.elapsed().as_millis() as u64),
            Err(envelope) => ExecutionEnvelope::err(envelope, started.elapsed().as_millis() as u64),
        }
    }

    async fn run_pipeline(&self, args: DispatchArgs) -> Result<Value, ErrorEnvelope> {
        let DispatchArgs { request, manifest, timeout_ms } = args;

        // Step 1: the chain's own time budget can only shrink the
        // caller's requested deadline, never extend it.
        let effective_timeout = timeout_ms.min(request.chain_limits.max_chain_time_ms);

        // Step 2: the artifact broker is the only broker this crate
        // builds; an invoke broker requires a plugin registry this
        // crate never holds, and the analytics emitter is an external
        // collaborator out of scope here.

        // Step 3: capability check.
        let missing = manifest.missing_capabilities(&request.permissions.capabilities);
        if !missing.is_empty() {
            return Err(DispatchError::CapabilityMissing(missing).into_envelope());
        }

        // Step 4: input schema validation.
        if let Some(schema) = &manifest.input_schema {
            schema::validate(schema, &request.input).map_err(|message| DispatchError::InputSchemaInvalid(message).into_envelope())?;
        }

        // Step 5: hand off to the selected backend.
        let plugin_id = request.plugin_id.clone();
        let outcome = self
            .backend
            .execute(request, effective_timeout)
            .await
            .map_err(|err| self.backend_error_envelope(err))?;

        // Step 6: output schema validation.
        if let Some(schema) = &manifest.output_schema {
            schema::validate(schema, &outcome.output).map_err(|message| DispatchError::OutputSchemaInvalid(message).into_envelope())?;
        }

        // Step 7: declared-artifact write-back.
        for id in &manifest.declared_artifacts {
            if let Some((_, value)) = find_declared_artifact_key(&outcome.output, id) {
                self.publish_declared_artifact(&plugin_id, id, value).await;
            }
        }

        Ok(outcome.output)
    }

    async fn publish_declared_artifact(&self, plugin_id: &pcore_ids::PluginId, id: &str, value: &Value) {
        let uri = pcore_artifacts::ArtifactUri { plugin_id: plugin_id.clone(), logical: id.to_string() };
        let write_entries = vec![pcore_protocol::ArtifactWriteEntry {
            to: pcore_protocol::ArtifactOwner::SelfOwned,
            paths: vec!["**".into()],
        }];
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(artifact_id = id, error = %err, "declared artifact value did not serialise, skipping write-back");
                return;
            }
        };
        let opts = WriteOptions { content_type: "application/json".into(), ..Default::default() };
        if let Err(err) = self.artifact_broker.write(&uri, &bytes, plugin_id.clone(), &write_entries, plugin_id, opts).await {
            warn!(artifact_id = id, error = %err, "failed to publish declared artifact");
        }
    }

    fn backend_error_envelope(&self, err: BackendError) -> ErrorEnvelope {
        DispatchError::from(err).into_envelope()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InProcessBackend, RemoteBackend};
    use pcore_errors::ErrorCode;
    use pcore_protocol::HandlerRef;
    use pcore_worker::{HandlerContext, StaticHandlerRegistry};
    use tempfile::tempdir;

    fn broker() -> (Arc<ArtifactBroker>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        (Arc::new(ArtifactBroker::new(dir.path().to_path_buf())), dir)
    }

    #[tokio::test]
    async fn successful_dispatch_assembles_ok_envelope() {
        let registry = StaticHandlerRegistry::new().register(
            "index.js",
            "run",
            Arc::new(|input: Value, _ctx: Arc<HandlerContext>| async move { Ok(input) }),
        );
        let (broker, _dir) = broker();
        let backend = Arc::new(InProcessBackend::new(Arc::new(registry), Arc::clone(&broker), false));
        let dispatcher = Dispatcher::new(backend, broker);

        let mut request = crate::test_support::sample_request("acme/formatter");
        request.handler_ref = HandlerRef { file: "index.js".into(), export: "run".into() };
        request.input = serde_json::json!({"value": 7});

        let envelope = dispatcher
            .execute(DispatchArgs { request, manifest: HandlerManifest::default(), timeout_ms: 5_000 })
            .await;
        assert!(envelope.ok);
        assert_eq!(envelope.data.unwrap(), serde_json::json!({"value": 7}));
    }

    #[tokio::test]
    async fn missing_capability_short_circuits_before_backend() {
        let (broker, _dir) = broker();
        let backend = Arc::new(RemoteBackend);
        let dispatcher = Dispatcher::new(backend, broker);

        let request = crate::test_support::sample_request("acme/formatter");
        let manifest = HandlerManifest { required_capabilities: vec!["shell:exec".into()], ..Default::default() };

        let envelope = dispatcher.execute(DispatchArgs { request, manifest, timeout_ms: 1_000 }).await;
        assert!(!envelope.ok);
        assert_eq!(envelope.error.unwrap().code, ErrorCode::CapabilityMissing);
    }

    #[tokio::test]
    async fn input_schema_violation_is_reported() {
        let (broker, _dir) = broker();
        let registry = StaticHandlerRegistry::new();
        let backend = Arc::new(InProcessBackend::new(Arc::new(registry), Arc::clone(&broker), false));
        let dispatcher = Dispatcher::new(backend, broker);

        let mut request = crate::test_support::sample_request("acme/formatter");
        request.input = serde_json::json!({});
        let manifest = HandlerManifest {
            input_schema: Some(serde_json::json!({
                "type": "object",
                "required": ["value"]
            })),
            ..Default::default()
        };

        let envelope = dispatcher.execute(DispatchArgs { request, manifest, timeout_ms: 1_000 }).await;
        assert!(!envelope.ok);
        assert_eq!(envelope.error.unwrap().code, ErrorCode::SchemaValidationFailed);
    }

    #[tokio::test]
    async fn declared_artifact_is_published_after_success() {
        let registry = StaticHandlerRegistry::new().register(
            "index.js",
            "run",
            Arc::new(|_input: Value, _ctx: Arc<HandlerContext>| async move {
                Ok(serde_json::json!({"reportSummary": {"total": 3}}))
            }),
        );
        let (broker, _dir) = broker();
        let backend = Arc::new(InProcessBackend::new(Arc::new(registry), Arc::clone(&broker), false));
        let dispatcher = Dispatcher::new(backend, Arc::clone(&broker));

        let mut request = crate::test_support::sample_request("acme/formatter");
        request.handler_ref = HandlerRef { file: "index.js".into(), export: "run".into() };
        let manifest = HandlerManifest { declared_artifacts: vec!["report-summary".into()], ..Default::default() };

        let envelope = dispatcher.execute(DispatchArgs { request, manifest, timeout_ms: 5_000 }).await;
        assert!(envelope.ok);

        let uri = pcore_artifacts::ArtifactUri::parse("artifact://acme/formatter/report-summary").unwrap();
        let read_entries =
            vec![pcore_protocol::ArtifactReadEntry { from: pcore_protocol::ArtifactOwner::SelfOwned, paths: vec!["**".into()], allowed_types: None }];
        let (data, _meta) = broker.read(&uri, &read_entries, None, &pcore_ids::PluginId::from("acme/formatter")).await.unwrap();
        assert_eq!(data, serde_json::to_vec(&serde_json::json!({"total": 3})).unwrap());
    }

    #[tokio::test]
    async fn remote_backend_error_propagates_as_not_implemented() {
        let (broker, _dir) = broker();
        let dispatcher = Dispatcher::new(Arc::new(RemoteBackend), broker);
        let request = crate::test_support::sample_request("acme/formatter");

        let envelope = dispatcher
            .execute(DispatchArgs { request, manifest: HandlerManifest::default(), timeout_ms: 1_000 })
            .await;
        assert!(!envelope.ok);
        assert_eq!(envelope.error.unwrap().code, ErrorCode::NotImplemented);
    }
}
