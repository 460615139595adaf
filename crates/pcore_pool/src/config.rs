//! Tunables for the worker-pool backend (§3 "Worker pool", §4.6).

use std::path::PathBuf;

/// `warmup.mode`: whether the pool pre-spawns `min` workers eagerly or
/// waits for the first `execute` to spawn lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupMode {
    Eager,
    Lazy,
}

/// `topN`/`maxHandlers` are advisory hints for which handler paths to
/// pre-resolve inside a freshly spawned worker — not required for
/// correctness, and this pool never acts on them beyond passing them
/// through to whatever pre-resolution an embedder wires into the
/// worker binary.
#[derive(Debug, Clone)]
pub struct WarmupConfig {
    pub mode: WarmupMode,
    pub top_n: u32,
    pub max_handlers: u32,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self { mode: WarmupMode::Lazy, top_n: 0, max_handlers: 0 }
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub min: usize,
    pub max: usize,
    pub max_requests_per_worker: u32,
    pub max_uptime_ms_per_worker: u64,
    /// `None` means unlimited: a plugin may occupy as many concurrent
    /// workers as the global `max` allows. See DESIGN.md for why this
    /// reading was chosen over "inherit pool default" (the source
    /// leaves it unresolved; §9 Open Questions).
    pub max_concurrent_per_plugin: Option<u32>,
    pub startup_timeout_ms: u64,
    pub health_check_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub warmup: WarmupConfig,
    /// Path to the `pcore-worker` binary this pool spawns.
    pub worker_binary: PathBuf,
    /// Base directory the artifact broker inside each worker publishes
    /// into; forwarded as `--artifact-root`.
    pub artifact_root: PathBuf,
    /// Grace window after an aborted execution's deadline before the
    /// worker is force-killed (§4.6 step 7). The source narrates this
    /// as "a grace window" without pinning a number down; chosen to be
    /// comfortably shorter than a typical deadline so a hung handler
    /// doesn't hold a pool slot much past its budget.
    pub abort_grace_ms: u64,
    /// How often the pool's background sweep checks for recycle-due
    /// and stale workers.
    pub health_check_interval_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min: 1,
            max: 4,
            max_requests_per_worker: 500,
            max_uptime_ms_per_worker: 30 * 60 * 1000,
            max_concurrent_per_plugin: None,
            startup_timeout_ms: 5_000,
            health_check_timeout_ms: 2_000,
            shutdown_timeout_ms: 5_000,
            warmup: WarmupConfig::default(),
            worker_binary: PathBuf::from("pcore-worker"),
            artifact_root: PathBuf::from("artifacts"),
            abort_grace_ms: 2_000,
            health_check_interval_ms: 10_000,
        }
    }
}
