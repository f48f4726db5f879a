//! # mentor-server
//!
//! Axum HTTP API for the Mentor delivery engine.
//!
//! - `GET /lesson` — next-lesson delivery (200 / 202+Retry-After / 4xx / 500)
//! - `POST /generate-pending` — explicit pending-queue top-up
//! - `GET /health`, `GET /metrics` — operational endpoints
//!
//! ## Crate Position
//!
//! Depends on mentor-engine and friends. Depended on by: mentor-agent.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

pub use config::ServerConfig;
pub use errors::ApiError;
pub use server::{MentorServer, build_router};
pub use shutdown::ShutdownCoordinator;
pub use state::AppState;
