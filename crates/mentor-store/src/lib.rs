//! # mentor-store
//!
//! `SQLite` persistence layer for the Mentor delivery engine.
//!
//! - **Connection pool**: r2d2 + WAL pragmas ([`connection`])
//! - **Migrations**: embedded, versioned, transactional ([`migrations`])
//! - **Repositories**: one stateless struct per table ([`repositories`])
//! - **StateStore**: key-scoped API with per-(user, subject) write locks,
//!   BUSY retry, and the atomic progress patch ([`store`])
//!
//! Rows are normalized into typed records at this boundary; untyped JSON
//! never escapes the crate.
//!
//! ## Crate Position
//!
//! Depends on mentor-core (domain types) and mentor-embeddings (vector blob
//! codecs). Depended on by: mentor-engine, mentor-server, mentor-agent.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod keys;
pub mod migrations;
pub mod repositories;
pub mod row_types;
pub mod store;

pub use connection::{ConnectionConfig, ConnectionPool, new_file, new_in_memory};
pub use errors::{Result, StoreError};
pub use keys::{StateKey, TopicKey};
pub use row_types::{CurriculumRow, LearnerProfile, LockStatus, PathStateRecord, SubjectActivity};
pub use store::{DeliveredAppend, ProgressPatch, StateStore};
