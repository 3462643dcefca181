//! Shared counter store abstractions.
//!
//! Every instance of the gate shares quota state through a remote
//! TTL-capable key-value store. The store holds opaque string keys and
//! decimal-text values; all counting logic lives in the rate limiter.

pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a counter store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport or server-side failure
    #[error("store backend error: {0}")]
    Backend(String),

    /// The bounded per-call timeout elapsed
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Trait for counter store implementations.
///
/// Abstracts over the Redis-backed store and the in-memory store so the
/// rate limiter can work with either.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the value for `key`. `Ok(None)` means the key does not exist
    /// (or has expired).
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Create or overwrite `key` with a fresh time-to-live.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Overwrite an existing key, keeping its remaining time-to-live.
    ///
    /// Returns `false` without writing when the key does not exist; it must
    /// never create a key or reset a TTL.
    async fn set_preserving_ttl(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Atomically replace the value of `key` with `new` only if it still
    /// equals `expected`, keeping the remaining time-to-live.
    ///
    /// Returns `false` when the key is absent or the value changed since it
    /// was read.
    async fn compare_and_swap_preserving_ttl(
        &self,
        key: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S: CounterStore + ?Sized> CounterStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        (**self).set_with_ttl(key, value, ttl).await
    }

    async fn set_preserving_ttl(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        (**self).set_preserving_ttl(key, value).await
    }

    async fn compare_and_swap_preserving_ttl(
        &self,
        key: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        (**self).compare_and_swap_preserving_ttl(key, expected, new).await
    }
}
