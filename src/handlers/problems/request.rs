//! Problem request DTOs

use serde::Deserialize;
use validator::Validate;

/// Preview run request
#[derive(Debug, Deserialize, Validate)]
pub struct RunCodeRequest {
    #[validate(length(min = 1, max = 20))]
    pub language: String,

    #[validate(length(min = 1, max = 50000))]
    pub source_code: String,
}
