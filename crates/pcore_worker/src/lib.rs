//! Worker process (C5): a long-lived child dedicated to executing
//! plugin handlers. Talks the parent↔worker wire protocol
//! (`pcore_protocol::wire`) over stdio and never shares memory with
//! other workers — all cross-worker state is mediated by the host via
//! the artifact broker, event bus, or state broker (§4.5).

mod handler;
mod run;

pub use handler::{
    ArtifactClient, EventsClient, Handler, HandlerContext, HandlerFuture, HandlerLoader,
    HandlerResult, StaticHandlerRegistry,
};
pub use run::{run_worker_loop, WorkerOptions};
