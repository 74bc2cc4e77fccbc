//! Database module
//!
//! This module handles database connections, migrations, repositories, and
//! the in-memory fallback store.

pub mod connection;
pub mod memory;
pub mod repositories;
pub mod store;

use sqlx::PgPool;

pub use connection::*;
pub use memory::MemoryStore;
pub use repositories::PgStore;
pub use store::{ProblemCatalog, StatisticsStore, SubmissionStore};

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
