//! Embedding error types.

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The service is not ready for inference.
    #[error("embedding service not ready")]
    NotReady,

    /// The remote service call failed.
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("embedding response invalid: {0}")]
    InvalidResponse(String),

    /// Inference produced no usable output.
    #[error("embedding inference failed: {0}")]
    Inference(String),
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;
