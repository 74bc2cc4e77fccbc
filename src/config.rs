//! Application configuration management
//!
//! Configuration is read from environment variables (a `.env` file is honoured
//! through `dotenvy`) and validated once at startup.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use crate::constants::{
    CPU_LIMIT, DEFAULT_COMPILE_TIMEOUT_MS, DEFAULT_DATABASE_MAX_CONNECTIONS, DEFAULT_JUDGE_WORKERS,
    DEFAULT_LEASE_TTL_SECONDS, DEFAULT_LOG_FILTER, DEFAULT_MEMORY_LIMIT_MB,
    DEFAULT_OUTPUT_LIMIT_BYTES, DEFAULT_PIDS_LIMIT, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT,
    DEFAULT_SWEEP_INTERVAL_SECONDS, DEFAULT_TIME_LIMIT_MS, PREVIEW_CASE_LIMIT,
    PREVIEW_MEMORY_LIMIT_MB, PREVIEW_TIME_LIMIT_MS,
};

/// Global application configuration (lazily initialized)
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::from_env().expect("Failed to load configuration from environment")
});

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sandbox: SandboxConfig,
    pub judge: JudgeConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
    pub log_format: LogFormat,
    pub request_timeout_seconds: u64,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Database configuration
///
/// Without a `DATABASE_URL` the server falls back to the in-memory store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

/// Which sandbox backend executes submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxBackend {
    /// One Docker container per compiled artifact
    Docker,
    /// Local child processes with rlimits (no filesystem/network isolation)
    Process,
}

impl SandboxBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Process => "process",
        }
    }
}

impl FromStr for SandboxBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docker" | "container" => Ok(Self::Docker),
            "process" | "local" => Ok(Self::Process),
            _ => Err(()),
        }
    }
}

/// Sandbox configuration
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub backend: SandboxBackend,
    /// CPU limit per container (number of cores)
    pub cpu_limit: f64,
    /// Maximum processes inside a container
    pub pids_limit: i64,
    /// `RLIMIT_NPROC` for the process backend; unset leaves the inherited limit
    pub process_limit: Option<u64>,
}

/// Judging pipeline configuration
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub default_time_limit_ms: u64,
    pub default_memory_limit_mb: u64,
    pub compile_timeout_ms: u64,
    pub preview_time_limit_ms: u64,
    pub preview_memory_limit_mb: u64,
    pub preview_case_limit: usize,
    pub output_limit_bytes: usize,
    pub lease_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    /// Reject obviously hostile sources before queueing
    pub screen_source: bool,
    /// JSON problem set loaded into the in-memory catalog
    pub problems_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            sandbox: SandboxConfig::from_env()?,
            judge: JudgeConfig::from_env()?,
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("pretty") | Err(_) => LogFormat::Pretty,
            Ok(_) => return Err(ConfigError::InvalidValue("LOG_FORMAT".to_string())),
        };

        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            port: parse_var("SERVER_PORT", DEFAULT_SERVER_PORT)?,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
            log_format,
            request_timeout_seconds: parse_var(
                "REQUEST_TIMEOUT_SECONDS",
                DEFAULT_REQUEST_TIMEOUT_SECONDS,
            )?,
        })
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            )?,
        })
    }
}

impl SandboxConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let backend = match env::var("SANDBOX_BACKEND") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SANDBOX_BACKEND".to_string()))?,
            Err(_) => SandboxBackend::Docker,
        };

        let process_limit = match env::var("SANDBOX_PROCESS_LIMIT") {
            Ok(value) => Some(
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("SANDBOX_PROCESS_LIMIT".to_string()))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            backend,
            cpu_limit: parse_var("SANDBOX_CPU_LIMIT", CPU_LIMIT)?,
            pids_limit: parse_var("SANDBOX_PIDS_LIMIT", DEFAULT_PIDS_LIMIT)?,
            process_limit,
        })
    }
}

impl JudgeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            workers: parse_var("JUDGE_WORKERS", DEFAULT_JUDGE_WORKERS)?,
            queue_capacity: parse_var("JUDGE_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
            default_time_limit_ms: parse_var("DEFAULT_TIME_LIMIT_MS", DEFAULT_TIME_LIMIT_MS)?,
            default_memory_limit_mb: parse_var(
                "DEFAULT_MEMORY_LIMIT_MB",
                DEFAULT_MEMORY_LIMIT_MB,
            )?,
            compile_timeout_ms: parse_var("COMPILE_TIMEOUT_MS", DEFAULT_COMPILE_TIMEOUT_MS)?,
            preview_time_limit_ms: parse_var("PREVIEW_TIME_LIMIT_MS", PREVIEW_TIME_LIMIT_MS)?,
            preview_memory_limit_mb: parse_var(
                "PREVIEW_MEMORY_LIMIT_MB",
                PREVIEW_MEMORY_LIMIT_MB,
            )?,
            preview_case_limit: parse_var("PREVIEW_CASE_LIMIT", PREVIEW_CASE_LIMIT)?,
            output_limit_bytes: parse_var("OUTPUT_LIMIT_BYTES", DEFAULT_OUTPUT_LIMIT_BYTES)?,
            lease_ttl_seconds: parse_var("LEASE_TTL_SECONDS", DEFAULT_LEASE_TTL_SECONDS)?,
            sweep_interval_seconds: parse_var(
                "SWEEP_INTERVAL_SECONDS",
                DEFAULT_SWEEP_INTERVAL_SECONDS,
            )?,
            screen_source: parse_var("SCREEN_SOURCE", true)?,
            problems_file: env::var("PROBLEMS_FILE").ok().map(PathBuf::from),
        };

        if config.workers == 0 {
            return Err(ConfigError::InvalidValue("JUDGE_WORKERS".to_string()));
        }
        if config.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue("JUDGE_QUEUE_CAPACITY".to_string()));
        }

        Ok(config)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_seconds)
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_JUDGE_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            default_time_limit_ms: DEFAULT_TIME_LIMIT_MS,
            default_memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            compile_timeout_ms: DEFAULT_COMPILE_TIMEOUT_MS,
            preview_time_limit_ms: PREVIEW_TIME_LIMIT_MS,
            preview_memory_limit_mb: PREVIEW_MEMORY_LIMIT_MB,
            preview_case_limit: PREVIEW_CASE_LIMIT,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            lease_ttl_seconds: DEFAULT_LEASE_TTL_SECONDS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            screen_source: true,
            problems_file: None,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: SandboxBackend::Docker,
            cpu_limit: CPU_LIMIT,
            pids_limit: DEFAULT_PIDS_LIMIT,
            process_limit: None,
        }
    }
}

/// Parse an optional environment variable, falling back to `default`
fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}
