//! Admin handlers
//!
//! Access control is enforced in front of this service.

mod handler;
pub mod response;

pub use handler::*;
pub use response::*;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Admin routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/dead-letters", get(handler::list_dead_letters))
}
