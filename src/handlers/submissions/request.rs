//! Submission request DTOs

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Create submission request
///
/// The caller's identity is resolved upstream; this service trusts `user_id`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubmissionRequest {
    pub user_id: Uuid,

    /// Problem ID to submit for
    pub problem_id: Uuid,

    /// Programming language
    #[validate(length(min = 1, max = 20))]
    pub language: String,

    /// Source code
    #[validate(length(min = 1, max = 50000))]
    pub source_code: String,
}
