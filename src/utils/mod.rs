//! Utility functions

pub mod validation;

pub use validation::{parse_language, screen_source, validate_source_code};
