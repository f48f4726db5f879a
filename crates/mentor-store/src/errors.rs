//! Error types for the persistence layer.
//!
//! [`StoreError`] is the primary error type returned by all store
//! operations. It provides specific variants for common failure modes while
//! keeping the surface area small enough for exhaustive pattern matching.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// A stored row failed boundary normalization into its typed form.
    ///
    /// Callers treat the row as structurally invalid (e.g., a path document
    /// is regenerated wholesale), never as a crash.
    #[error("corrupt row in {table}: {message}")]
    Corrupt {
        /// Table the row came from.
        table: &'static str,
        /// What failed to normalize.
        message: String,
    },

    /// The pending queue for the key is at max depth.
    #[error("pending queue full: depth {depth}")]
    QueueFull {
        /// Current depth.
        depth: usize,
    },

    /// Internal error (e.g. poisoned lock).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
