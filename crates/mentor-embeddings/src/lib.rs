//! # mentor-embeddings
//!
//! Embedding service seam and semantic-similarity deduplication for the
//! Mentor delivery engine.
//!
//! - Trait-based [`EmbeddingService`] with a deterministic SHA-256 mock and
//!   an HTTP-backed remote implementation
//! - L2 normalization, cosine similarity, and f32 ↔ BLOB codecs
//! - [`Deduplicator`]: near-duplicate verdicts at a fixed cosine threshold,
//!   degrading to "accept" when no embedding is available
//!
//! ## Crate Position
//!
//! Standalone (no mentor crate dependencies).
//! Depended on by: mentor-store, mentor-engine, mentor-agent.

#![deny(unsafe_code)]

pub mod dedup;
pub mod errors;
pub mod normalize;
pub mod remote;
pub mod service;

pub use dedup::{DEFAULT_SIMILARITY_THRESHOLD, DedupVerdict, Deduplicator};
pub use errors::{EmbeddingError, Result};
pub use normalize::{blob_to_f32_vec, cosine_similarity, f32_slice_to_blob, l2_norm, l2_normalize};
pub use remote::RemoteEmbeddingService;
pub use service::{EmbeddingService, MockEmbeddingService};
