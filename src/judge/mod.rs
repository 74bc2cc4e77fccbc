//! Judging core: drives the sandbox over test cases and resolves verdicts

pub mod runner;
pub mod verdict;

use uuid::Uuid;

use crate::error::AppError;

pub use runner::{Evaluation, RunOutcome, TestRunner, outputs_match};
pub use verdict::{CompileOutcome, TestSummary, judge, resolve};

/// Failures that abort a judging run and end in `System Error`
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("toolchain failure: {0}")]
    Toolchain(String),

    #[error("sandbox failure: {0}")]
    Sandbox(String),

    #[error("problem {0} not found")]
    ProblemMissing(Uuid),

    /// The submission left `Running` under us, usually a sweeper takeover
    #[error("judging lease lost")]
    LeaseLost,

    #[error(transparent)]
    Store(#[from] AppError),
}
