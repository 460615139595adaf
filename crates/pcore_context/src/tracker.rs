//! Append-only record of side-effect intents (file writes, config
//! mutations, artifact publishes, …).
//!
//! Insertion order is preserved for the lifetime of the tracker;
//! `mark_*` calls only ever mutate `status`/`reason`/`timestamp` on an
//! already-appended record, never its position.

use parking_lot::Mutex;
use pcore_protocol::{OperationMetadata, OperationRecord, OperationStatus};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OperationTrackerError {
    #[error("no tracked operation with id {0}")]
    UnknownId(u64),
}

struct Inner {
    records: Vec<OperationRecord>,
    metadata: Vec<OperationMetadata>,
    next_id: u64,
}

/// Thread-safe append-only operation log. Cheap to share: clone the
/// `Arc` a context hands out rather than the tracker itself.
pub struct OperationTracker {
    inner: Mutex<Inner>,
}

impl Default for OperationTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl OperationTracker {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { records: Vec::new(), metadata: Vec::new(), next_id: 1 }) }
    }

    /// `track(op, metadata, {status, reason?}) → id`.
    pub fn track(
        &self,
        kind: impl Into<String>,
        action: impl Into<String>,
        path: Option<String>,
        pointer: Option<String>,
        metadata: OperationMetadata,
        status: OperationStatus,
        reason: Option<String>,
    ) -> u64 {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.records.push(OperationRecord {
            id,
            kind: kind.into(),
            action: action.into(),
            path,
            pointer,
            status,
            reason,
            timestamp: now_ms(),
        });
        inner.metadata.push(metadata);
        id
    }

    fn set_status(
        &self,
        id: u64,
        status: OperationStatus,
        reason: Option<String>,
    ) -> Result<(), OperationTrackerError> {
        let mut inner = self.inner.lock();
        let record = inner
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(OperationTrackerError::UnknownId(id))?;
        record.status = status;
        record.reason = reason;
        record.timestamp = now_ms();
        Ok(())
    }

    pub fn mark_applied(&self, id: u64) -> Result<(), OperationTrackerError> {
        self.set_status(id, OperationStatus::Applied, None)
    }

    pub fn mark_skipped(&self, id: u64, reason: Option<String>) -> Result<(), OperationTrackerError> {
        self.set_status(id, OperationStatus::Skipped, reason)
    }

    pub fn mark_failed(&self, id: u64, reason: Option<String>) -> Result<(), OperationTrackerError> {
        self.set_status(id, OperationStatus::Failed, reason)
    }

    /// `toArray()`: a snapshot in insertion order.
    pub fn to_array(&self) -> Vec<OperationRecord> {
        self.inner.lock().records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn tracked_operations_preserve_insertion_order() {
        let tracker = OperationTracker::new();
        let a = tracker.track("file", "write", Some("a.txt".into()), None, HashMap::new(), OperationStatus::Pending, None);
        let b = tracker.track("file", "write", Some("b.txt".into()), None, HashMap::new(), OperationStatus::Pending, None);
        tracker.mark_applied(a).unwrap();
        tracker.mark_failed(b, Some("disk full".into())).unwrap();

        let records = tracker.to_array();
        assert_eq!(records[0].id, a);
        assert_eq!(records[1].id, b);
        assert_eq!(records[0].status, OperationStatus::Applied);
        assert_eq!(records[1].status, OperationStatus::Failed);
        assert_eq!(records[1].reason.as_deref(), Some("disk full"));
    }

    #[test]
    fn marking_unknown_id_errors() {
        let tracker = OperationTracker::new();
        let err = tracker.mark_applied(999).unwrap_err();
        assert_eq!(err, OperationTrackerError::UnknownId(999));
    }

    #[test]
    fn mark_never_reorders_records() {
        let tracker = OperationTracker::new();
        let ids: Vec<u64> = (0..5)
            .map(|i| tracker.track("file", "write", Some(format!("{i}.txt")), None, HashMap::new(), OperationStatus::Pending, None))
            .collect();
        // Mark in reverse to confirm order survives regardless of mutation order.
        for id in ids.iter().rev() {
            tracker.mark_applied(*id).unwrap();
        }
        let records = tracker.to_array();
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), ids);
    }
}
