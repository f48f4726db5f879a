//! Generator error taxonomy with retryability classification.

use thiserror::Error;

/// Result type alias for generator operations.
pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// Errors that can occur during generation calls.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The generator returned content that failed validation.
    ///
    /// Transient format errors are common and self-correct on retry; the
    /// orchestrator maps this to a retryable `Generating` response.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// What failed to validate.
        message: String,
    },

    /// The account's generation quota is exhausted.
    #[error("usage limit exceeded: {message}")]
    UsageLimitExceeded {
        /// Provider message.
        message: String,
    },

    /// The generator returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// The call exceeded its timeout budget.
    #[error("generation timed out")]
    Timeout,

    /// Generator-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl GeneratorError {
    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .is_some_and(|s| s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error())
            }
            Self::InvalidFormat { .. } | Self::Timeout => true,
            Self::Api { retryable, .. } => *retryable,
            Self::UsageLimitExceeded { .. } | Self::Json(_) | Self::Other { .. } => false,
        }
    }

    /// Error category string for metrics and logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) => "parse",
            Self::InvalidFormat { .. } => "invalid_format",
            Self::UsageLimitExceeded { .. } => "usage_limit",
            Self::Api { .. } => "api",
            Self::Timeout => "timeout",
            Self::Other { .. } => "unknown",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
