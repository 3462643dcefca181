//! Quotagate - Distributed Admission Gate
//!
//! This crate gates access to a protected resource server by enforcing a
//! per-API-key request quota shared across every server instance. Quota
//! windows live in a remote counter store (Redis) as lazily-initialized,
//! TTL-bounded counters; unseen credentials are resolved against a
//! principal directory the first time they appear.

pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod store;
