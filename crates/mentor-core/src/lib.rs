//! # mentor-core
//!
//! Foundation types, branded IDs, and the curriculum domain model for the
//! Mentor lesson delivery engine.
//!
//! This crate provides the shared vocabulary that all other mentor crates
//! depend on:
//!
//! - **Branded IDs**: [`ids::LessonId`], [`ids::AttemptId`], [`ids::UserId`]
//!   as newtypes
//! - **Curriculum**: [`path::LearningPath`], [`path::PathCursor`],
//!   [`path::CompletionMap`] and the cursor-advance scan
//! - **Lessons**: [`lesson::Lesson`] payloads plus cached/pending/delivered
//!   wrappers
//! - **Progress**: [`progress::AttemptRow`], [`progress::ProgressSnapshot`],
//!   [`progress::Pace`], accuracy banding
//! - **Context**: [`context::StructuredContext`] (sent to the generator) and
//!   [`context::Guardrails`] (local exclusion state, never sent)
//! - **Text**: character-budget truncation and title normalization
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other mentor crates.

#![deny(unsafe_code)]

pub mod constants;
pub mod context;
pub mod ids;
pub mod lesson;
pub mod path;
pub mod progress;
pub mod text;
