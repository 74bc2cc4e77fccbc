//! Test runner
//!
//! Runs a compiled artifact against test cases in declared order. Every case
//! is attempted: a timeout or crash on one case never stops the next one, and
//! each case is a fresh process so nothing carries over between cases.

use crate::{
    constants::OUTPUT_PREVIEW_CHARS,
    models::{Language, SubmissionStatus, TestCase, TestResult},
    sandbox::{
        CompileError, CompiledArtifact, ExecuteError, ResourceLimits, Sandbox,
        output::truncate_chars,
    },
};

use super::{
    JudgeError,
    verdict::{CompileOutcome, resolve},
};

/// Trimmed, line-ending-normalised exact comparison
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize(actual) == normalize(expected)
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").trim().to_string()
}

/// Per-test results and the verdict they resolve to
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub results: Vec<TestResult>,
    pub status: SubmissionStatus,
}

/// Compile outcome plus whatever ran after it
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub compile: CompileOutcome,
    pub results: Vec<TestResult>,
}

/// Drives a sandbox across test cases
pub struct TestRunner<'a> {
    sandbox: &'a dyn Sandbox,
}

impl<'a> TestRunner<'a> {
    pub fn new(sandbox: &'a dyn Sandbox) -> Self {
        Self { sandbox }
    }

    /// Judge a single case
    ///
    /// Only a sandbox failure is an `Err`; everything the program itself does
    /// becomes a [`TestResult`].
    pub async fn run_case(
        &self,
        artifact: &CompiledArtifact,
        index: usize,
        case: &TestCase,
        limits: &ResourceLimits,
    ) -> Result<TestResult, JudgeError> {
        let index = index as u32;
        let output = match self.sandbox.execute(artifact, &case.input, limits).await {
            Ok(output) => output,
            Err(ExecuteError::TimedOut) => {
                return Ok(TestResult::timeout(index, limits.time_limit_ms()));
            }
            Err(ExecuteError::Process(message)) => return Err(JudgeError::Sandbox(message)),
        };

        let time_ms = output.elapsed_ms();
        let memory_kb = output.peak_memory_kb;
        let actual = truncate_chars(&output.stdout, OUTPUT_PREVIEW_CHARS);

        if output.truncated {
            return Ok(TestResult::error(
                index,
                actual,
                time_ms,
                memory_kb,
                "Output limit exceeded".to_string(),
            ));
        }

        if !output.success() {
            let mut message = match (output.signal, output.exit_code) {
                (Some(signal), _) => format!("Killed by signal {}", signal),
                (None, Some(code)) => format!("Exited with code {}", code),
                (None, None) => "Terminated abnormally".to_string(),
            };
            let stderr = output.stderr.trim();
            if !stderr.is_empty() {
                message.push_str(": ");
                message.push_str(&truncate_chars(stderr, 500));
            }
            return Ok(TestResult::error(index, actual, time_ms, memory_kb, message));
        }

        if outputs_match(&output.stdout, &case.expected_output) {
            Ok(TestResult::passed(index, actual, time_ms, memory_kb))
        } else {
            Ok(TestResult::failed(index, actual, time_ms, memory_kb))
        }
    }

    /// Judge every case, in order, and resolve the verdict
    pub async fn run(
        &self,
        artifact: &CompiledArtifact,
        cases: &[TestCase],
        limits: &ResourceLimits,
    ) -> Result<RunOutcome, JudgeError> {
        let mut results = Vec::with_capacity(cases.len());
        for (index, case) in cases.iter().enumerate() {
            results.push(self.run_case(artifact, index, case, limits).await?);
        }

        let status = resolve(&CompileOutcome::Succeeded, results.iter().map(|r| r.status));
        Ok(RunOutcome { results, status })
    }

    /// Compile, run every case, and release the artifact on every path
    pub async fn evaluate(
        &self,
        source: &str,
        language: Language,
        cases: &[TestCase],
        limits: &ResourceLimits,
    ) -> Result<Evaluation, JudgeError> {
        let artifact = match self.sandbox.compile(source, language, limits).await {
            Ok(artifact) => artifact,
            Err(CompileError::Diagnostics(diagnostics)) => {
                return Ok(Evaluation {
                    compile: CompileOutcome::Failed(diagnostics),
                    results: Vec::new(),
                });
            }
            Err(CompileError::Toolchain(message)) => return Err(JudgeError::Toolchain(message)),
        };

        let outcome = self.run(&artifact, cases, limits).await;
        self.sandbox.release(artifact).await;

        Ok(Evaluation {
            compile: CompileOutcome::Succeeded,
            results: outcome?.results,
        })
    }
}
