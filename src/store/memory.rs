//! In-memory counter store with real expiry semantics.
//!
//! Useful for unit tests and single-process deployments where a remote
//! store would be overkill. Expired entries are evicted lazily on access,
//! which matches the "auto-deletion at TTL" contract closely enough for
//! the rate limiter: an expired key reads as absent.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{CounterStore, StoreError};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= Instant::now())
    }
}

/// Counter store backed by a process-local map.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    operations: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of store calls made so far.
    ///
    /// Lets tests assert that a code path never touched the store.
    pub fn operations(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap();
        entries.values().filter(|e| !e.is_expired()).count()
    }

    /// Whether the store holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Absolute expiry deadline for `key`, if present and unexpired.
    pub fn expires_at(&self, key: &str) -> Option<Instant> {
        let mut entries = self.entries.lock().unwrap();
        Self::live(&mut entries, key).and_then(|e| e.expires_at)
    }

    /// Remaining lifetime for `key`, if present and unexpired.
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        self.expires_at(key)
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let expired = entries.get(key).is_some_and(Entry::is_expired);
        if expired {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().unwrap();
        Ok(Self::live(&mut entries, key).map(|e| e.value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_preserving_ttl(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().unwrap();
        match Self::live(&mut entries, key) {
            Some(entry) => {
                entry.value = value.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn compare_and_swap_preserving_ttl(
        &self,
        key: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().unwrap();
        match Self::live(&mut entries, key) {
            Some(entry) if entry.value == expected => {
                entry.value = new.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();
        store.set_with_ttl("k", "5", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("5".to_string()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemoryStore::new();
        store.set_with_ttl("k", "5", Duration::from_millis(20)).await.unwrap();
        assert_eq!(store.len(), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_set_preserving_ttl_noops_on_absent_key() {
        let store = MemoryStore::new();
        assert!(!store.set_preserving_ttl("k", "5").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_preserving_ttl_keeps_deadline() {
        let store = MemoryStore::new();
        store.set_with_ttl("k", "5", Duration::from_secs(10)).await.unwrap();
        let deadline = store.expires_at("k").unwrap();

        assert!(store.set_preserving_ttl("k", "4").await.unwrap());
        assert_eq!(store.expires_at("k"), Some(deadline));
        assert_eq!(store.get("k").await.unwrap(), Some("4".to_string()));

        let ttl = store.remaining_ttl("k").unwrap();
        assert!(ttl <= Duration::from_secs(10));
        assert!(ttl > Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = MemoryStore::new();
        store.set_with_ttl("k", "5", Duration::from_secs(10)).await.unwrap();

        assert!(store.compare_and_swap_preserving_ttl("k", "5", "4").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("4".to_string()));

        // Stale expectation loses.
        assert!(!store.compare_and_swap_preserving_ttl("k", "5", "3").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("4".to_string()));

        // Absent key never swaps.
        assert!(!store.compare_and_swap_preserving_ttl("gone", "1", "0").await.unwrap());
    }

    #[tokio::test]
    async fn test_operation_counter() {
        let store = MemoryStore::new();
        assert_eq!(store.operations(), 0);
        store.get("k").await.unwrap();
        store.set_with_ttl("k", "1", Duration::from_secs(1)).await.unwrap();
        assert_eq!(store.operations(), 2);
    }
}
