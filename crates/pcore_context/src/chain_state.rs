//! Transitive plugin-to-plugin invocation bookkeeping, bounded by a
//! request's `ChainLimits`.

use pcore_ids::PluginId;
use pcore_protocol::ChainLimits;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Mutable state threaded through a chain of plugin invocations
/// rooted at a single external request.
///
/// `fan_out` counts *this node's own* direct children, so it is a
/// counter shared by every sibling spawned from the same parent —
/// unlike `depth`, which is per-path and simply copied on descent.
#[derive(Debug, Clone)]
pub struct ChainState {
    limits: ChainLimits,
    depth: u32,
    fan_out: Arc<AtomicU32>,
    visited: HashSet<PluginId>,
    started_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainLimitViolation {
    MaxDepth,
    MaxFanOut,
    MaxChainTime,
}

impl ChainState {
    pub fn root(limits: ChainLimits) -> Self {
        Self {
            limits,
            depth: 0,
            fan_out: Arc::new(AtomicU32::new(0)),
            visited: HashSet::new(),
            started_at: Instant::now(),
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn fan_out(&self) -> u32 {
        self.fan_out.load(Ordering::SeqCst)
    }

    pub fn has_visited(&self, plugin_id: &PluginId) -> bool {
        self.visited.contains(plugin_id)
    }

    /// Produce the chain state for a child invocation one level deeper,
    /// checking every limit before admitting it. Increments this
    /// node's fan-out counter as a side effect of a successful call.
    pub fn descend(&self, plugin_id: PluginId) -> Result<Self, ChainLimitViolation> {
        if self.depth + 1 > self.limits.max_depth {
            return Err(ChainLimitViolation::MaxDepth);
        }
        if self.elapsed_ms() >= self.limits.max_chain_time_ms {
            return Err(ChainLimitViolation::MaxChainTime);
        }
        let prior = self.fan_out.fetch_add(1, Ordering::SeqCst);
        if prior + 1 > self.limits.max_fan_out {
            self.fan_out.fetch_sub(1, Ordering::SeqCst);
            return Err(ChainLimitViolation::MaxFanOut);
        }
        let mut visited = self.visited.clone();
        visited.insert(plugin_id);
        Ok(Self {
            limits: self.limits.clone(),
            depth: self.depth + 1,
            fan_out: Arc::new(AtomicU32::new(0)),
            visited,
            started_at: self.started_at,
        })
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn remaining_chain_time_ms(&self) -> u64 {
        self.limits.max_chain_time_ms.saturating_sub(self.elapsed_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_depth: u32, max_fan_out: u32, max_chain_time_ms: u64) -> ChainLimits {
        ChainLimits { max_depth, max_fan_out, max_chain_time_ms }
    }

    #[test]
    fn root_starts_at_zero_depth() {
        let chain = ChainState::root(limits(4, 4, 1000));
        assert_eq!(chain.depth(), 0);
    }

    #[test]
    fn descend_increments_depth_and_parents_fan_out() {
        let chain = ChainState::root(limits(4, 4, 1000));
        let child = chain.descend(PluginId::from("acme/a")).unwrap();
        assert_eq!(child.depth(), 1);
        assert_eq!(chain.fan_out(), 1);
        assert!(child.has_visited(&PluginId::from("acme/a")));
    }

    #[test]
    fn descend_past_max_depth_is_rejected() {
        let chain = ChainState::root(limits(1, 10, 10_000));
        let child = chain.descend(PluginId::from("acme/a")).unwrap();
        let err = child.descend(PluginId::from("acme/b")).unwrap_err();
        assert_eq!(err, ChainLimitViolation::MaxDepth);
    }

    #[test]
    fn descend_past_max_fan_out_is_rejected() {
        let chain = ChainState::root(limits(10, 1, 10_000));
        chain.descend(PluginId::from("acme/a")).unwrap();
        let err = chain.descend(PluginId::from("acme/b")).unwrap_err();
        assert_eq!(err, ChainLimitViolation::MaxFanOut);
    }
}
