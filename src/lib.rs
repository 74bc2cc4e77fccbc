//! ArenaJudge - Online Judge Core
//!
//! This library compiles, runs and grades untrusted submissions against a
//! problem's test cases, and keeps per-user and per-problem statistics.
//!
//! # Features
//!
//! - Multi-language support (C, C++, Java, JavaScript, Python)
//! - Isolated Docker container execution, or rlimited local processes
//! - Bounded judging queue with a fixed worker pool
//! - Exactly-once statistics per judged submission
//!
//! # Architecture
//!
//! The application follows a layered architecture:
//! - **Handlers**: HTTP request handlers (thin layer)
//! - **Services**: Submission lifecycle, worker pool, statistics
//! - **Judge**: Test runner and verdict resolution
//! - **Sandbox**: Per-language compile/execute strategies
//! - **Repositories**: Database access, plus an in-memory store
//! - **Models**: Domain models

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod handlers;
pub mod judge;
pub mod middleware;
pub mod models;
pub mod sandbox;
pub mod services;
pub mod state;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
