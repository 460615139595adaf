//! Execution dispatcher (C7): picks a backend, runs the dispatch
//! pipeline against it, and assembles the result envelope every
//! caller of this core ultimately receives.

mod backend;
mod dispatch;
mod error;
mod manifest;
mod schema;
mod selector;

#[cfg(test)]
mod test_support;

pub use backend::{
    BackendError, BackendOutcome, ExecutionBackend, InProcessBackend, RemoteBackend, SubprocessBackend, WorkerPoolBackend,
};
pub use dispatch::{DispatchArgs, Dispatcher, ExecutionEnvelope, ExecutionMetrics};
pub use error::DispatchError;
pub use manifest::{camel_to_kebab, find_declared_artifact_key, kebab_to_camel, HandlerManifest};
pub use schema::validate as validate_schema;
pub use selector::{BackendSelector, EnvSnapshot, Mode};
