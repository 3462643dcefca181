//! Shared fixed-window rate limiter.
//!
//! All quota state lives in the counter store, so any number of limiter
//! instances can run concurrently across server processes without
//! in-process coordination. Windows are bootstrapped lazily by
//! [`SharedRateLimiter::allow_new`] and drained in place by
//! [`SharedRateLimiter::allow_if_tracked`].

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::store::{CounterStore, StoreError};

use super::window::{decode_remaining, encode_remaining, DecodeError, WindowKey};

/// Contended write attempts before a probe gives up (fail-closed).
const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Errors from limiter operations.
#[derive(Error, Debug)]
pub enum LimiterError {
    /// Counter store call failed or timed out
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Stored window value did not decode
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Every write attempt lost the race to a concurrent request
    #[error("window update contended {0} times, giving up")]
    Contention(u32),
}

/// Outcome of probing an existing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// A window exists; carries the post-decrement remaining count,
    /// negative once the window is exhausted.
    Tracked(i64),
    /// No window for this key yet; the caller should resolve the
    /// principal and bootstrap one.
    Untracked,
}

/// Fixed-window rate limiter over a shared counter store.
pub struct SharedRateLimiter<S> {
    store: S,
    retry_budget: u32,
}

impl<S: CounterStore> SharedRateLimiter<S> {
    /// Create a limiter with the default write retry budget.
    pub fn new(store: S) -> Self {
        Self::with_retry_budget(store, DEFAULT_RETRY_BUDGET)
    }

    /// Create a limiter with an explicit write retry budget (minimum 1).
    pub fn with_retry_budget(store: S, retry_budget: u32) -> Self {
        Self {
            store,
            retry_budget: retry_budget.max(1),
        }
    }

    /// Probe the window for `key` and consume one unit of quota if any is
    /// left.
    ///
    /// Returns [`Probe::Untracked`] on a store miss, which is not an error:
    /// it means the key has not been bootstrapped this period. Once the
    /// stored count reaches zero, further probes return a negative count
    /// without writing, so the store never holds a negative value and the
    /// exhausted window simply ages out with its TTL.
    ///
    /// The decrement is a read followed by a compare-and-swap that keeps
    /// the window's remaining TTL. Losing the swap means a concurrent
    /// request drained the same window first; the probe re-reads and tries
    /// again up to the retry budget, then fails closed.
    pub async fn allow_if_tracked(&self, key: &WindowKey) -> Result<Probe, LimiterError> {
        let storage_key = key.storage_key();

        for attempt in 0..self.retry_budget {
            let Some(stored) = self.store.get(&storage_key).await? else {
                return Ok(Probe::Untracked);
            };

            let remaining = decode_remaining(&stored).map_err(|e| {
                error!(key = %key, value = %e.value, "undecodable window value in counter store");
                e
            })?;

            let candidate = remaining - 1;
            if candidate < 0 {
                // Exhausted. No write: the persisted value stays clamped at
                // zero until the window expires.
                return Ok(Probe::Tracked(candidate));
            }

            let swapped = self
                .store
                .compare_and_swap_preserving_ttl(
                    &storage_key,
                    &stored,
                    &encode_remaining(candidate),
                )
                .await?;
            if swapped {
                return Ok(Probe::Tracked(candidate));
            }

            // Lost to a concurrent request, or the window expired mid-flight.
            // The next read settles which.
            debug!(key = %key, attempt, "contended window update, retrying");
        }

        warn!(
            key = %key,
            attempts = self.retry_budget,
            "window update retry budget exhausted"
        );
        Err(LimiterError::Contention(self.retry_budget))
    }

    /// Bootstrap the window for `key` with a fresh quota and TTL, consuming
    /// one unit for the triggering request.
    ///
    /// Overwrites any window a concurrent bootstrap may have just created;
    /// at worst one decrement is lost, which is an accepted trade-off for a
    /// fixed-window counter. A non-positive quota seeds an already exhausted
    /// window: the stored value still clamps at zero, and the returned count
    /// is negative so the caller rejects the request.
    pub async fn allow_new(
        &self,
        key: &WindowKey,
        quota: i64,
        period: Duration,
    ) -> Result<i64, LimiterError> {
        let remaining = quota - 1;
        self.store
            .set_with_ttl(
                &key.storage_key(),
                &encode_remaining(remaining.max(0)),
                period,
            )
            .await?;

        debug!(
            key = %key,
            quota,
            period_secs = period.as_secs(),
            "bootstrapped quota window"
        );
        Ok(remaining)
    }
}
