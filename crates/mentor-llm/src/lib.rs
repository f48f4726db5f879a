//! # mentor-llm
//!
//! Generator adapter for the external lesson generation model.
//!
//! - [`Generator`] trait: `generate_lesson` + `generate_path`
//! - [`HttpGenerator`]: reqwest JSON client with status → error mapping
//! - [`MockGenerator`]: scripted mock for tests
//! - Strict draft validation — malformed output is `InvalidFormat`,
//!   which the orchestrator treats as retryable
//!
//! ## Crate Position
//!
//! Depends on mentor-core (context and lesson types).
//! Depended on by: mentor-engine, mentor-agent.

#![deny(unsafe_code)]

pub mod errors;
pub mod generator;
pub mod http;
pub mod types;

pub use errors::{GeneratorError, GeneratorResult};
pub use generator::{Generator, MockGenerator};
pub use http::{HttpGenerator, HttpGeneratorConfig};
pub use types::{
    LessonDraft, LessonRequest, ModelSpeed, PathRequest, QuestionDraft, validate_draft,
};
