//! Test utilities
//!
//! [`ScriptedSandbox`] stands in for a real backend. The "source code" of a
//! submission is a `;`-separated script describing how the fake program
//! behaves:
//!
//! | directive          | effect                                           |
//! |--------------------|--------------------------------------------------|
//! | `echo`             | print the input (default)                        |
//! | `sum`              | print the sum of the integers in the input       |
//! | `print:<text>`     | print `<text>` regardless of input               |
//! | `timeout-on:<in>`  | time out when the input is `<in>`                |
//! | `crash-on:<in>`    | exit 1 with `boom` on stderr for input `<in>`     |
//! | `spam-on:<in>`     | exceed the output cap for input `<in>`           |
//! | `sleep:<ms>`       | take `<ms>` milliseconds per run                 |
//! | `sandbox-fail`     | every run fails inside the sandbox               |
//! | `syntax-error`     | compilation fails with diagnostics               |
//! | `no-toolchain`     | the compiler cannot be invoked                   |

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    config::{
        Config, DatabaseConfig, JudgeConfig, LogFormat, SandboxBackend, SandboxConfig,
        ServerConfig,
    },
    models::{Language, Problem, TestCase},
    sandbox::{
        CompileError, CompiledArtifact, ExecuteError, ExecutionOutput, ResourceLimits, Sandbox,
        Workspace,
    },
};

/// Deterministic in-process sandbox driven by the submitted "source"
#[derive(Debug, Default)]
pub struct ScriptedSandbox {
    compiles: AtomicUsize,
    executions: AtomicUsize,
    released: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl ScriptedSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Highest number of executions observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }
}

fn directives(script: &str) -> impl Iterator<Item = (&str, Option<&str>)> {
    script.split(';').map(str::trim).filter(|d| !d.is_empty()).map(|d| {
        match d.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (d, None),
        }
    })
}

fn has(script: &str, name: &str) -> bool {
    directives(script).any(|(n, _)| n == name)
}

fn triggered(script: &str, name: &str, input: &str) -> bool {
    directives(script).any(|(n, arg)| n == name && arg == Some(input.trim()))
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn compile(
        &self,
        source: &str,
        language: Language,
        _limits: &ResourceLimits,
    ) -> Result<CompiledArtifact, CompileError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);

        if has(source, "no-toolchain") {
            return Err(CompileError::Toolchain("compiler not found".to_string()));
        }
        if has(source, "syntax-error") {
            return Err(CompileError::Diagnostics(
                "solution:1:1: error: expected ';' before '}' token".to_string(),
            ));
        }

        Ok(CompiledArtifact::new(
            language,
            source.to_string(),
            Workspace::Detached,
        ))
    }

    async fn execute(
        &self,
        artifact: &CompiledArtifact,
        input: &str,
        limits: &ResourceLimits,
    ) -> Result<ExecutionOutput, ExecuteError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now_active, Ordering::SeqCst);

        let script = artifact.run_command();
        let delay = directives(script)
            .find(|(n, _)| *n == "sleep")
            .and_then(|(_, ms)| ms?.parse().ok())
            .map(Duration::from_millis);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = if has(script, "sandbox-fail") {
            Err(ExecuteError::Process("container vanished".to_string()))
        } else if triggered(script, "timeout-on", input) {
            Err(ExecuteError::TimedOut)
        } else if triggered(script, "crash-on", input) {
            Ok(ExecutionOutput {
                stderr: "boom".to_string(),
                exit_code: Some(1),
                elapsed: Duration::from_millis(3),
                ..Default::default()
            })
        } else if triggered(script, "spam-on", input) {
            Ok(ExecutionOutput {
                stdout: "y".repeat(64),
                exit_code: None,
                signal: Some(9),
                elapsed: Duration::from_millis(3),
                truncated: true,
                ..Default::default()
            })
        } else {
            let stdout = if let Some((_, text)) = directives(script).find(|(n, _)| *n == "print") {
                text.unwrap_or_default().to_string()
            } else if has(script, "sum") {
                input
                    .split_whitespace()
                    .filter_map(|n| n.parse::<i64>().ok())
                    .sum::<i64>()
                    .to_string()
            } else {
                input.to_string()
            };
            Ok(ExecutionOutput {
                stdout,
                exit_code: Some(0),
                elapsed: Duration::from_millis(2).min(limits.time_limit),
                ..Default::default()
            })
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn release(&self, _artifact: CompiledArtifact) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// A judging-ready problem whose cases expect their input echoed back
pub fn echo_problem(visible: usize, hidden: usize) -> Problem {
    let test_cases = (0..visible + hidden)
        .map(|i| TestCase::new((i + 1).to_string(), (i + 1).to_string(), i >= visible))
        .collect();

    Problem {
        id: uuid::Uuid::new_v4(),
        title: "Echo".to_string(),
        time_limit_ms: 1000,
        memory_limit_mb: 64,
        test_cases,
    }
}

/// Configuration for in-process tests: in-memory store, default judge settings
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            rust_log: "arenajudge=debug".to_string(),
            log_format: LogFormat::Pretty,
            request_timeout_seconds: 5,
        },
        database: DatabaseConfig {
            url: None,
            max_connections: 1,
        },
        sandbox: SandboxConfig {
            backend: SandboxBackend::Process,
            ..SandboxConfig::default()
        },
        judge: JudgeConfig::default(),
    }
}
