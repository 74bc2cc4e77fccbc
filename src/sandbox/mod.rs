//! Execution sandbox
//!
//! A [`Sandbox`] compiles a source file into a [`CompiledArtifact`] and runs
//! that artifact once per test input under hard time and memory ceilings.
//! Two backends exist: [`DockerSandbox`] (one locked-down container per
//! artifact) and [`ProcessSandbox`] (rlimited local processes, for development
//! and CI only).
//!
//! Every artifact owns its workspace. Dropping it removes the workspace, so
//! temporary state cannot outlive a judging run on any path; [`Sandbox::release`]
//! performs the same cleanup eagerly.

pub mod container;
pub mod languages;
pub mod output;
pub mod process;

use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use uuid::Uuid;

use crate::models::Language;

pub use container::{ContainerLease, DockerSandbox};
pub use languages::{LanguageHandler, LanguageRegistry};
pub use process::ProcessSandbox;

/// Ceilings applied to one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub time_limit: Duration,
    pub memory_limit_mb: u64,
}

impl ResourceLimits {
    pub fn new(time_limit_ms: u64, memory_limit_mb: u64) -> Self {
        Self {
            time_limit: Duration::from_millis(time_limit_ms),
            memory_limit_mb,
        }
    }

    pub fn time_limit_ms(&self) -> u64 {
        self.time_limit.as_millis() as u64
    }

    pub fn memory_limit_bytes(&self) -> u64 {
        self.memory_limit_mb * 1024 * 1024
    }
}

/// Where a compiled artifact lives
#[derive(Debug)]
pub enum Workspace {
    /// Temporary directory on the host, removed on drop
    Local(TempDir),
    /// Dedicated container, force-removed on drop
    Container(ContainerLease),
    /// No backing storage (scripted sandboxes in tests)
    Detached,
}

/// Output of a successful compile step, ready to be executed
#[derive(Debug)]
pub struct CompiledArtifact {
    id: Uuid,
    language: Language,
    run_command: String,
    workspace: Workspace,
}

impl CompiledArtifact {
    pub fn new(language: Language, run_command: String, workspace: Workspace) -> Self {
        Self {
            id: Uuid::new_v4(),
            language,
            run_command,
            workspace,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn run_command(&self) -> &str {
        &self.run_command
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn into_workspace(self) -> Workspace {
        self.workspace
    }
}

/// Captured result of one program run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub elapsed: Duration,
    /// Peak resident memory; `None` when the backend cannot measure it
    pub peak_memory_kb: Option<u64>,
    /// stdout or stderr exceeded the capture limit and the run was cut off
    pub truncated: bool,
}

impl ExecutionOutput {
    /// Check if the program exited normally with status 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && self.signal.is_none() && !self.truncated
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Compilation failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// The user's code does not compile; the text is shown to the user
    #[error("{0}")]
    Diagnostics(String),

    /// The toolchain could not be invoked at all
    #[error("Toolchain failure: {0}")]
    Toolchain(String),
}

/// Execution failure not attributable to the program's own behaviour
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecuteError {
    /// Wall-clock ceiling reached; the process was killed
    #[error("Time limit exceeded")]
    TimedOut,

    /// The sandbox could not run the program
    #[error("Process error: {0}")]
    Process(String),
}

/// Compile-and-run backend
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Prepare `source` for execution. Interpreted languages always succeed
    /// unless the workspace itself cannot be created.
    async fn compile(
        &self,
        source: &str,
        language: Language,
        limits: &ResourceLimits,
    ) -> Result<CompiledArtifact, CompileError>;

    /// Run the artifact once with `input` on stdin
    async fn execute(
        &self,
        artifact: &CompiledArtifact,
        input: &str,
        limits: &ResourceLimits,
    ) -> Result<ExecutionOutput, ExecuteError>;

    /// Tear the artifact's workspace down
    async fn release(&self, artifact: CompiledArtifact);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_clean_exit() {
        let mut output = ExecutionOutput {
            exit_code: Some(0),
            ..Default::default()
        };
        assert!(output.success());

        output.truncated = true;
        assert!(!output.success());

        let killed = ExecutionOutput {
            exit_code: None,
            signal: Some(9),
            ..Default::default()
        };
        assert!(!killed.success());
    }

    #[test]
    fn test_limits() {
        let limits = ResourceLimits::new(1500, 64);
        assert_eq!(limits.time_limit_ms(), 1500);
        assert_eq!(limits.memory_limit_bytes(), 64 * 1024 * 1024);
    }
}
