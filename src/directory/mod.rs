//! Principal directory lookups.
//!
//! The directory maps an opaque credential to the principal behind it and
//! that principal's quota entitlement. It is consulted once per window
//! bootstrap, never cached in-process: a store miss always re-fetches.

pub mod postgres;

pub use postgres::PostgresDirectory;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Resolved identity behind an opaque credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Stable identifier derived from the credential
    pub identifier: String,
    /// Calls allowed per quota window
    pub quota_per_window: i64,
}

/// Errors surfaced by a directory backend.
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// Transport or server-side failure
    #[error("directory backend error: {0}")]
    Backend(String),

    /// The bounded per-query timeout elapsed
    #[error("directory query timed out after {0:?}")]
    Timeout(Duration),
}

/// Trait for principal directory implementations.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Look up the principal owning `credential`.
    ///
    /// `Ok(None)` means the credential is unknown; the caller rejects the
    /// request without creating a window.
    async fn find_by_credential(
        &self,
        credential: &str,
    ) -> Result<Option<Principal>, DirectoryError>;
}

/// Fixed in-memory directory for tests and local development.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    principals: HashMap<String, Principal>,
}

impl StaticDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a principal under `credential`.
    pub fn with_principal(mut self, credential: &str, principal: Principal) -> Self {
        self.principals.insert(credential.to_string(), principal);
        self
    }
}

#[async_trait]
impl PrincipalDirectory for StaticDirectory {
    async fn find_by_credential(
        &self,
        credential: &str,
    ) -> Result<Option<Principal>, DirectoryError> {
        Ok(self.principals.get(credential).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_directory_lookup() {
        let directory = StaticDirectory::new().with_principal(
            "abc",
            Principal {
                identifier: "abc".to_string(),
                quota_per_window: 30,
            },
        );

        let principal = directory.find_by_credential("abc").await.unwrap().unwrap();
        assert_eq!(principal.quota_per_window, 30);

        assert!(directory.find_by_credential("xyz").await.unwrap().is_none());
    }
}
