//! Operation tracker and execution-context builder (C9).
//!
//! Split out of the dispatcher crate so `pcore_worker` can depend on
//! the context type without depending on the dispatcher itself (the
//! worker only ever *receives* a built context over the wire; it never
//! builds one).

mod chain_state;
mod context;
mod tracker;

pub use chain_state::ChainState;
pub use context::{CancellationSignal, ExecutionContext, ExecutionContextBuilder};
pub use tracker::{OperationTracker, OperationTrackerError};
