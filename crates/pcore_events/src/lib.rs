//! Scoped in-memory event bus (C4): quotas, deduplication, and
//! back-pressure over per-scope (`local`/`plugin`) listener sets.

mod bus;
mod dedup;
mod error;
mod permissions;

pub use bus::{
    Disposer, DropPolicy, EmitOptions, EventBus, EventBusConfig, HandlerFn, OnOptions,
};
pub use dedup::DedupCache;
pub use error::{EventBusError, EventBusResult};
pub use permissions::{can_consume, can_produce};
