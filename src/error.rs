//! Error types for the quotagate service.

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for admission decisions and process bootstrap.
#[derive(Error, Debug)]
pub enum GateError {
    /// No credential in either the header or the query parameter carrier
    #[error("no api key specified")]
    CredentialMissing,

    /// Credential unknown to the principal directory
    #[error("api key invalid")]
    CredentialInvalid,

    /// The current quota window is exhausted
    #[error("rate limit exceeded")]
    QuotaExhausted {
        /// Post-decrement count, negative once the window is drained
        remaining: i64,
    },

    /// Counter store unreachable, timed out, or refused a write
    #[error("counter store unavailable: {0}")]
    StoreUnavailable(String),

    /// Stored window value did not decode as an integer
    #[error("counter store returned an undecodable value: {0}")]
    StoreDecodeError(String),

    /// Principal directory unreachable or timed out
    #[error("principal directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// Configuration-related errors
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// HTTP status reported to the caller for this error.
    ///
    /// Auth failures (403) are kept distinct from throttling (429) and
    /// internal faults (500) so callers can back off on 429 alone.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::CredentialMissing | GateError::CredentialInvalid => StatusCode::FORBIDDEN,
            GateError::QuotaExhausted { .. } => StatusCode::TOO_MANY_REQUESTS,
            GateError::StoreUnavailable(_)
            | GateError::StoreDecodeError(_)
            | GateError::DirectoryUnavailable(_)
            | GateError::Config(_)
            | GateError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type alias for quotagate operations.
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GateError::CredentialMissing.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(GateError::CredentialInvalid.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            GateError::QuotaExhausted { remaining: -1 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            GateError::StoreUnavailable("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GateError::StoreDecodeError("garbage".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
