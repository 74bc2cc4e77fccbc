//! Application-wide constants
//!
//! Constants are grouped by their purpose. Anything tunable at runtime has a
//! `DEFAULT_` constant here and an environment override in [`crate::config`].

// =============================================================================
// SERVER DEFAULTS
// =============================================================================

/// Default server host address
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default server port
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "arenajudge=debug,tower_http=info,sqlx=warn";

/// Default request timeout in seconds (preview runs are synchronous)
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 60;

/// Maximum accepted request body size in bytes
pub const MAX_REQUEST_BODY_BYTES: usize = 256 * 1024;

// =============================================================================
// DATABASE DEFAULTS
// =============================================================================

/// Default maximum database connections in the pool
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 20;

// =============================================================================
// JUDGING DEFAULTS
// =============================================================================

/// Default number of judge workers (and concurrent execution slots)
pub const DEFAULT_JUDGE_WORKERS: usize = 4;

/// Default capacity of the pending-submission queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default per-test time limit in milliseconds
pub const DEFAULT_TIME_LIMIT_MS: u64 = 2000;

/// Default memory limit in megabytes
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 256;

/// Compilation wall-clock ceiling in milliseconds
pub const DEFAULT_COMPILE_TIMEOUT_MS: u64 = 10_000;

/// Relaxed per-test time limit for preview runs
pub const PREVIEW_TIME_LIMIT_MS: u64 = 5000;

/// Relaxed memory limit for preview runs
pub const PREVIEW_MEMORY_LIMIT_MB: u64 = 512;

/// Number of visible test cases a preview run uses
pub const PREVIEW_CASE_LIMIT: usize = 3;

/// Captured bytes per stream before the run is cut off
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1024 * 1024;

/// Characters of actual output kept on a test result
pub const OUTPUT_PREVIEW_CHARS: usize = 1000;

/// Maximum length of a diagnostic string surfaced to users
pub const MAX_DIAGNOSTIC_LENGTH: usize = 8 * 1024;

/// A `Running` claim older than this is considered abandoned
pub const DEFAULT_LEASE_TTL_SECONDS: u64 = 600;

/// How often the stale-lease sweep runs
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

/// Number of dead-letter entries kept in memory
pub const DEAD_LETTER_CAPACITY: usize = 500;

/// Minimum number of test cases a problem needs for full judging
pub const MIN_JUDGING_TEST_CASES: usize = 3;

/// Generic message stored when judging fails internally
pub const SYSTEM_ERROR_MESSAGE: &str = "Internal judging system error";

/// Message stored when a stale claim is reclaimed
pub const INTERRUPTED_MESSAGE: &str = "Judging was interrupted";

// =============================================================================
// SANDBOX DEFAULTS
// =============================================================================

/// CPU limit per container (number of cores)
pub const CPU_LIMIT: f64 = 1.0;

/// Maximum number of processes inside one sandbox
pub const DEFAULT_PIDS_LIMIT: i64 = 64;

/// Working directory inside judge containers
pub const CONTAINER_WORKSPACE: &str = "/workspace";

/// Scratch directory each run executes in; wiped after every run
pub const CONTAINER_RUN_DIR: &str = "/tmp/arenajudge-run";

/// Largest base64 chunk written per exec when copying files into a container
pub const CONTAINER_WRITE_CHUNK_BYTES: usize = 64 * 1024;

// =============================================================================
// SUPPORTED LANGUAGES
// =============================================================================

/// Language identifiers
pub mod languages {
    pub const C: &str = "c";
    pub const CPP: &str = "cpp";
    pub const JAVA: &str = "java";
    pub const JAVASCRIPT: &str = "javascript";
    pub const PYTHON: &str = "python";

    /// All supported language identifiers
    pub const ALL: &[&str] = &[C, CPP, JAVA, JAVASCRIPT, PYTHON];
}

/// Container images for each language
pub mod container_images {
    pub const C: &str = "gcc:13";
    pub const CPP: &str = "gcc:13";
    pub const JAVA: &str = "eclipse-temurin:21-jdk";
    pub const JAVASCRIPT: &str = "node:20-slim";
    pub const PYTHON: &str = "python:3.12-slim";
}

// =============================================================================
// SUBMISSION STATUSES
// =============================================================================

/// Submission status identifiers as stored
pub mod statuses {
    pub const PENDING: &str = "pending";
    pub const RUNNING: &str = "running";
    pub const ACCEPTED: &str = "accepted";
    pub const WRONG_ANSWER: &str = "wrong_answer";
    pub const TIME_LIMIT_EXCEEDED: &str = "time_limit_exceeded";
    pub const RUNTIME_ERROR: &str = "runtime_error";
    pub const COMPILATION_ERROR: &str = "compilation_error";
    pub const SYSTEM_ERROR: &str = "system_error";
}

/// Per-test result identifiers as stored
pub mod test_statuses {
    pub const PASSED: &str = "passed";
    pub const FAILED: &str = "failed";
    pub const TIMEOUT: &str = "timeout";
    pub const ERROR: &str = "error";
}

// =============================================================================
// API VERSIONING
// =============================================================================

/// API base path
pub const API_BASE_PATH: &str = "/api/v1";

// =============================================================================
// VALIDATION
// =============================================================================

/// Maximum source code length in characters
pub const MAX_SOURCE_CODE_LENGTH: usize = 50_000;
