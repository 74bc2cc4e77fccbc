//! Application state management
//!
//! This module contains the shared application state that is passed
//! to all request handlers via Axum's State extractor.

use std::sync::Arc;

use crate::{config::Config, db::StatisticsStore, services::SubmissionService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

/// Inner state (wrapped in Arc for cheap cloning)
struct AppStateInner {
    /// Submission lifecycle and preview runs
    submissions: Arc<SubmissionService>,

    /// Read side of the aggregate counters
    statistics: Arc<dyn StatisticsStore>,

    /// Application configuration
    config: Config,
}

impl AppState {
    /// Create a new application state
    pub fn new(
        submissions: Arc<SubmissionService>,
        statistics: Arc<dyn StatisticsStore>,
        config: Config,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                submissions,
                statistics,
                config,
            }),
        }
    }

    /// Get the submission service
    pub fn submissions(&self) -> &SubmissionService {
        &self.inner.submissions
    }

    /// Get the statistics store
    pub fn statistics(&self) -> &dyn StatisticsStore {
        self.inner.statistics.as_ref()
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}
