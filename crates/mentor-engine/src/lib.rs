//! # mentor-engine
//!
//! The lesson delivery and progress engine.
//!
//! - [`pathstate::PathState`]: curriculum cursor, lock-guarded synthesis
//! - [`rollup::ProgressRollup`]: accuracy/pace with event-driven recompute
//! - [`context::ContextAssembler`]: compact generator payload + guardrails
//! - [`cache::LessonCache`]: persona-scoped warm cache selection
//! - [`pending::PendingQueue`]: bounded FIFO with read-time revalidation
//! - [`producer::PendingProducer`]: decoupled background pre-generation
//! - [`writer::ProgressWriter`]: the atomic post-delivery patch
//! - [`orchestrator::DeliveryOrchestrator`]: the request state machine
//!
//! ## Crate Position
//!
//! Depends on mentor-core, mentor-store, mentor-embeddings, mentor-llm,
//! mentor-settings. Depended on by: mentor-server, mentor-agent.

#![deny(unsafe_code)]

pub mod cache;
pub mod context;
pub mod errors;
pub mod orchestrator;
pub mod pathstate;
pub mod pending;
pub mod persona;
pub mod producer;
pub mod rollup;
pub mod writer;

pub use cache::LessonCache;
pub use context::{AssembleInputs, ContextAssembler, DeliveryContext, gather_context};
pub use errors::{EngineError, EngineResult};
pub use orchestrator::{
    DeliveredPayload, DeliveryOrchestrator, DeliveryRequest, DeliveryResponse, DeliverySource,
};
pub use pathstate::{EnsureOutcome, PathState, next_incomplete_after};
pub use pending::PendingQueue;
pub use persona::{persona_for, persona_hash, tone_signature};
pub use producer::{PendingProducer, ProduceReport, ProduceRequest, ProducerHandle};
pub use rollup::{ProgressRollup, compute_snapshot};
pub use writer::{PersistOutcome, ProgressWriter};
