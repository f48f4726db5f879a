//! Engine error taxonomy.
//!
//! Mirrors the user-visible failure contract: terminal failures
//! (`NoSubject`, `NotReady`, `UsageLimitExceeded`), the retryable
//! `Generating` signal, and internal failures that surface as generic
//! server errors. Cache, queue, and embedding failures never appear here —
//! they degrade in place.

use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during lesson delivery.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No subject could be resolved for the learner.
    #[error("no subject available for learner")]
    NoSubject,

    /// The subject has no curriculum mapping, or synthesis produced an
    /// empty path. Retryable after onboarding completes, not fatal.
    #[error("subject not ready: {message}")]
    NotReady {
        /// What is missing.
        message: String,
    },

    /// Generation is in progress elsewhere (lock contention) or hit a
    /// transient format error. The caller should retry after the hint.
    #[error("generation in progress, retry after {retry_after_secs}s")]
    Generating {
        /// Suggested retry delay in seconds.
        retry_after_secs: u64,
    },

    /// The learner's generation quota is exhausted.
    #[error("usage limit exceeded: {message}")]
    UsageLimitExceeded {
        /// Provider message.
        message: String,
    },

    /// Persistent store failure on the critical path.
    #[error("store error: {0}")]
    Store(#[from] mentor_store::StoreError),

    /// Generator failure that is neither transient-format nor quota.
    #[error("generator error: {0}")]
    Generator(#[from] mentor_llm::GeneratorError),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether the caller should retry after a short delay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Generating { .. })
    }

    /// Stable machine-readable code for the API layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSubject => "NO_SUBJECT",
            Self::NotReady { .. } => "NOT_READY",
            Self::Generating { .. } => "GENERATING",
            Self::UsageLimitExceeded { .. } => "USAGE_LIMIT_EXCEEDED",
            Self::Store(_) | Self::Generator(_) | Self::Internal(_) => "SERVER_ERROR",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
