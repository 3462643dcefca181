//! Fixed-window rate limiting over a shared counter store.

pub mod limiter;
pub mod window;

pub use limiter::{LimiterError, Probe, SharedRateLimiter};
pub use window::{decode_remaining, encode_remaining, DecodeError, WindowKey};
