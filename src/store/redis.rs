//! Redis-backed counter store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use std::future::Future;
use std::time::Duration;

use super::{CounterStore, StoreError};

/// Replaces a key's value only if it still equals what the caller read,
/// keeping the remaining TTL. Returns 1 on swap, 0 when the key is absent
/// or its value changed.
const CAS_KEEPTTL_SCRIPT: &str = r#"
local current = redis.call("GET", KEYS[1])
if current == false then
    return 0
end
if current ~= ARGV[1] then
    return 0
end
redis.call("SET", KEYS[1], ARGV[2], "KEEPTTL")
return 1
"#;

/// Counter store backed by a Redis server.
///
/// Uses a [`ConnectionManager`] so connections are pooled and re-established
/// transparently. Every call is wrapped in a bounded timeout; a slow store
/// surfaces as an error rather than hanging the gate.
pub struct RedisStore {
    connection: ConnectionManager,
    op_timeout: Duration,
    cas_script: Script,
}

impl RedisStore {
    /// Connect to the Redis server at `url`.
    ///
    /// Connection setup is bounded by the same timeout as later calls, so
    /// an unresponsive server cannot hang process startup.
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|e| StoreError::Backend(e.to_string()))?;
        let connection = match tokio::time::timeout(op_timeout, client.get_connection_manager())
            .await
        {
            Ok(result) => result.map_err(|e| StoreError::Backend(e.to_string()))?,
            Err(_) => return Err(StoreError::Timeout(op_timeout)),
        };

        Ok(Self {
            connection,
            op_timeout,
            cas_script: Script::new(CAS_KEEPTTL_SCRIPT),
        })
    }

    /// Run a store call under the configured timeout.
    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, call).await {
            Ok(result) => result.map_err(|e| StoreError::Backend(e.to_string())),
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        }
    }
}

/// TTL as whole milliseconds for `PX`, clamped to Redis's minimum of 1.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = self
            .bounded(redis::cmd("GET").arg(key).query_async(&mut conn))
            .await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _reply: () = self
            .bounded(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("PX")
                    .arg(ttl_millis(ttl))
                    .query_async(&mut conn),
            )
            .await?;
        Ok(())
    }

    async fn set_preserving_ttl(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        // XX: only overwrite an existing key. KEEPTTL: do not touch its expiry.
        let reply: Option<String> = self
            .bounded(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("XX")
                    .arg("KEEPTTL")
                    .query_async(&mut conn),
            )
            .await?;
        Ok(reply.is_some())
    }

    async fn compare_and_swap_preserving_ttl(
        &self,
        key: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let swapped: i64 = self
            .bounded(
                self.cas_script
                    .key(key)
                    .arg(expected)
                    .arg(new)
                    .invoke_async(&mut conn),
            )
            .await?;
        Ok(swapped == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_keeps_subsecond_precision() {
        assert_eq!(ttl_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(ttl_millis(Duration::from_secs(300)), 300_000);
    }

    #[test]
    fn test_ttl_millis_clamps_to_minimum() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
    }

    #[tokio::test]
    async fn test_connect_is_bounded_by_timeout() {
        // Blackhole address: the TCP connect never completes, so without a
        // bounded setup this would hang instead of returning.
        let result =
            RedisStore::connect("redis://10.255.255.1:6379", Duration::from_millis(100)).await;
        assert!(result.is_err());
    }
}
