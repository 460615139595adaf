//! Idempotency dedup cache: a fixed-size LRU keyed by an explicit
//! `idempotencyKey` or, absent that, a hash of the event's identity.

use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

pub struct DedupCache {
    cache: LruCache<String, Instant>,
    ttl: Duration,
}

impl DedupCache {
    pub fn new(capacity: usize, ttl_ms: u64) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self { cache: LruCache::new(capacity), ttl: Duration::from_millis(ttl_ms) }
    }

    pub fn key_for(
        idempotency_key: Option<&str>,
        topic: &str,
        scope: &str,
        payload: &serde_json::Value,
        trace_id: Option<&str>,
    ) -> String {
        if let Some(key) = idempotency_key {
            return key.to_string();
        }
        let mut hasher = Sha256::new();
        hasher.update(topic.as_bytes());
        hasher.update(scope.as_bytes());
        hasher.update(payload.to_string().as_bytes());
        hasher.update(trace_id.unwrap_or("").as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Returns `true` if this key was seen within the TTL window
    /// (a duplicate that should be dropped), and records the key as
    /// seen either way.
    pub fn check_and_record(&mut self, key: &str) -> bool {
        let now = Instant::now();
        if let Some(seen_at) = self.cache.get(key) {
            if now.duration_since(*seen_at) < self.ttl {
                return true;
            }
        }
        self.cache.put(key.to_string(), now);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_within_ttl_is_detected() {
        let mut cache = DedupCache::new(16, 60_000);
        assert!(!cache.check_and_record("k1"));
        assert!(cache.check_and_record("k1"));
    }

    #[test]
    fn key_for_uses_explicit_idempotency_key_when_present() {
        let key = DedupCache::key_for(Some("explicit"), "topic", "local", &serde_json::json!({}), None);
        assert_eq!(key, "explicit");
    }

    #[test]
    fn key_for_derives_hash_without_idempotency_key() {
        let payload = serde_json::json!({"a": 1});
        let key1 = DedupCache::key_for(None, "topic", "local", &payload, Some("trace-1"));
        let key2 = DedupCache::key_for(None, "topic", "local", &payload, Some("trace-1"));
        let key3 = DedupCache::key_for(None, "topic", "local", &payload, Some("trace-2"));
        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
    }

    #[test]
    fn cache_evicts_oldest_entry_when_full() {
        let mut cache = DedupCache::new(1, 60_000);
        assert!(!cache.check_and_record("a"));
        assert!(!cache.check_and_record("b"));
        // "a" was evicted to make room for "b", so it's no longer a duplicate.
        assert!(!cache.check_and_record("a"));
    }
}
