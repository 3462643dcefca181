//! Window key scheme and value codec.

use thiserror::Error;

/// Error for stored window values that do not decode as integers.
///
/// Indicates either data corruption or a key-namespace collision; the
/// request that observed it must be rejected.
#[derive(Error, Debug)]
#[error("window value is not a decimal integer: {value:?}")]
pub struct DecodeError {
    /// The raw stored value that failed to decode
    pub value: String,
}

/// Addresses one principal's quota window in the shared store.
///
/// The storage key is `{namespace}:{resource}:{identifier}`, so different
/// resources sharing an identifier string never share a window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    namespace: String,
    resource: String,
    identifier: String,
}

impl WindowKey {
    /// Create a new window key.
    pub fn new(namespace: &str, resource: &str, identifier: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            resource: resource.to_string(),
            identifier: identifier.to_string(),
        }
    }

    /// Render the composite key the window is stored under.
    pub fn storage_key(&self) -> String {
        format!("{}:{}:{}", self.namespace, self.resource, self.identifier)
    }
}

impl std::fmt::Display for WindowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// Serialize a remaining-count to the store's decimal-text representation.
pub fn encode_remaining(remaining: i64) -> String {
    remaining.to_string()
}

/// Parse a stored remaining-count.
pub fn decode_remaining(value: &str) -> Result<i64, DecodeError> {
    value.parse().map_err(|_| DecodeError {
        value: value.to_string(),
    })
}
