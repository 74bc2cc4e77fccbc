//! Domain models
//!
//! This module contains all domain models used throughout the application.

pub mod language;
pub mod problem;
pub mod submission;
pub mod user;

pub use language::*;
pub use problem::*;
pub use submission::*;
pub use user::*;
