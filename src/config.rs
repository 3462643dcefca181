//! Configuration management for quotagate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration for the quotagate service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotagateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Shared counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Principal directory configuration
    #[serde(default)]
    pub directory: DirectoryConfig,
}

impl Default for QuotagateConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            rate_limiting: RateLimitingConfig::default(),
            store: StoreConfig::default(),
            directory: DirectoryConfig::default(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the guarded HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Key namespace all quota windows live under
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Resource tag separating quota pools that share credentials
    #[serde(default = "default_resource")]
    pub resource: String,

    /// Quota window length in seconds
    #[serde(default = "default_window_period")]
    pub window_period_secs: u64,

    /// Contended window-update attempts before a request is rejected
    #[serde(default = "default_write_retry_budget")]
    pub write_retry_budget: u32,
}

impl RateLimitingConfig {
    /// Quota window length as a duration.
    pub fn window_period(&self) -> Duration {
        Duration::from_secs(self.window_period_secs)
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            resource: default_resource(),
            window_period_secs: default_window_period(),
            write_retry_budget: default_write_retry_budget(),
        }
    }
}

fn default_namespace() -> String {
    "ratelimiter".to_string()
}

fn default_resource() -> String {
    "apikey".to_string()
}

fn default_window_period() -> u64 {
    300
}

fn default_write_retry_budget() -> u32 {
    3
}

/// Shared counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_store_timeout")]
    pub op_timeout_ms: u64,
}

impl StoreConfig {
    /// Per-call timeout as a duration.
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            op_timeout_ms: default_store_timeout(),
        }
    }
}

fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_store_timeout() -> u64 {
    2000
}

/// Principal directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Postgres connection URI
    #[serde(default = "default_directory_url")]
    pub url: String,

    /// Per-query timeout in milliseconds
    #[serde(default = "default_directory_timeout")]
    pub query_timeout_ms: u64,
}

impl DirectoryConfig {
    /// Per-query timeout as a duration.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: default_directory_url(),
            query_timeout_ms: default_directory_timeout(),
        }
    }
}

fn default_directory_url() -> String {
    "postgres://localhost/quotagate".to_string()
}

fn default_directory_timeout() -> u64 {
    5000
}

impl QuotagateConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: QuotagateConfig = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::GateError::Config(e.to_string()))?;
        Ok(config)
    }
}
