//! Submission service
//!
//! Owns the submission lifecycle: intake, polling, preview runs, and the
//! judging of a claimed submission through to a terminal status.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::{
    config::JudgeConfig,
    constants::{INTERRUPTED_MESSAGE, SYSTEM_ERROR_MESSAGE},
    db::{ProblemCatalog, SubmissionStore},
    error::{AppError, AppResult},
    handlers::{
        problems::response::{PreviewCaseResult, RunCodeResponse, RunSummary},
        submissions::response::SubmissionStatusResponse,
    },
    judge::{CompileOutcome, JudgeError, TestRunner, judge},
    models::{Judgement, Language, NewSubmission, Problem, Submission},
    sandbox::{CompileError, ResourceLimits, Sandbox},
    utils::validation::{parse_language, screen_source, validate_source_code},
};

use super::{DeadLetterLog, JudgeQueue, StatisticsService};

/// Submission service for business logic
pub struct SubmissionService {
    submissions: Arc<dyn SubmissionStore>,
    problems: Arc<dyn ProblemCatalog>,
    statistics: Arc<StatisticsService>,
    sandbox: Arc<dyn Sandbox>,
    queue: JudgeQueue,
    slots: Arc<Semaphore>,
    dead_letters: Arc<DeadLetterLog>,
    config: JudgeConfig,
}

impl SubmissionService {
    pub fn new(
        submissions: Arc<dyn SubmissionStore>,
        problems: Arc<dyn ProblemCatalog>,
        statistics: Arc<StatisticsService>,
        sandbox: Arc<dyn Sandbox>,
        queue: JudgeQueue,
        config: JudgeConfig,
    ) -> Self {
        Self {
            submissions,
            problems,
            statistics,
            sandbox,
            queue,
            slots: Arc::new(Semaphore::new(config.workers.max(1))),
            dead_letters: Arc::new(DeadLetterLog::default()),
            config,
        }
    }

    pub fn dead_letters(&self) -> &DeadLetterLog {
        &self.dead_letters
    }

    pub fn queue(&self) -> &JudgeQueue {
        &self.queue
    }

    /// Validate, persist as `Pending`, and queue for judging
    pub async fn submit(
        &self,
        user_id: Uuid,
        source_code: String,
        language: &str,
        problem_id: Uuid,
    ) -> AppResult<Submission> {
        let language = self.check_source(language, &source_code)?;
        let problem = self.find_problem(problem_id).await?;
        problem
            .validate_for_judging()
            .map_err(AppError::Validation)?;

        // Refuse before creating a record nobody will pick up soon
        if !self.queue.has_capacity() {
            return Err(AppError::QueueFull);
        }

        let submission = self
            .submissions
            .create(NewSubmission {
                user_id,
                problem_id,
                language,
                source_code,
            })
            .await?;

        if let Err(e) = self.queue.try_enqueue(submission.id) {
            // Stays pending; the sweeper re-enqueues it
            tracing::warn!(submission_id = %submission.id, "Could not enqueue submission: {}", e);
        }

        tracing::info!(
            submission_id = %submission.id,
            user_id = %user_id,
            problem_id = %problem_id,
            language = %language,
            "Submission queued"
        );
        Ok(submission)
    }

    /// Polling contract; a pure read
    pub async fn get_status(&self, id: Uuid) -> AppResult<SubmissionStatusResponse> {
        let submission = self
            .submissions
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;

        Ok(SubmissionStatusResponse::from(&submission))
    }

    /// Run against the first sample cases with relaxed limits; nothing is stored
    pub async fn run_preview(
        &self,
        source_code: &str,
        language: &str,
        problem_id: Uuid,
    ) -> AppResult<RunCodeResponse> {
        let language = self.check_source(language, source_code)?;
        let problem = self.find_problem(problem_id).await?;

        let cases = problem.preview_cases(self.config.preview_case_limit);
        if cases.is_empty() {
            return Err(AppError::Validation(
                "No sample test cases available".to_string(),
            ));
        }

        let limits = ResourceLimits::new(
            self.config.preview_time_limit_ms,
            self.config.preview_memory_limit_mb,
        );

        let _permit = self.acquire_slot().await?;
        let evaluation = TestRunner::new(self.sandbox.as_ref())
            .evaluate(source_code, language, &cases, &limits)
            .await
            .map_err(|e| match e {
                JudgeError::Store(e) => e,
                other => AppError::Sandbox(other.to_string()),
            })?;

        let compile_error = match evaluation.compile {
            CompileOutcome::Failed(diagnostics) => Some(diagnostics),
            CompileOutcome::Succeeded => None,
        };
        let total_tests = evaluation.results.len();
        let passed_tests = evaluation.results.iter().filter(|r| r.is_passed()).count();
        let status = if compile_error.is_some() {
            "Compilation Error"
        } else if passed_tests == total_tests {
            "All Passed"
        } else {
            "Some Failed"
        };

        let results = cases
            .iter()
            .zip(evaluation.results)
            .map(|(case, result)| PreviewCaseResult::new(case, result))
            .collect();

        Ok(RunCodeResponse {
            results,
            compile_error,
            summary: RunSummary {
                total_tests,
                passed_tests,
                failed_tests: total_tests - passed_tests,
                status: status.to_string(),
            },
        })
    }

    /// Judge one submission to a terminal status.
    ///
    /// A submission that cannot be claimed (already running or finished) is
    /// skipped. Any failure after the claim ends in `System Error`, except a
    /// lost lease: whoever took it over owns the verdict.
    pub async fn process(&self, id: Uuid) {
        self.queue.taken(id);
        let submission = match self.submissions.claim(id).await {
            Ok(Some(submission)) => submission,
            Ok(None) => {
                tracing::debug!(submission_id = %id, "Submission not claimable, skipping");
                return;
            }
            Err(e) => {
                tracing::error!(submission_id = %id, "Failed to claim submission: {}", e);
                return;
            }
        };

        tracing::info!(submission_id = %id, language = %submission.language, "Judging submission");

        match self.judge_claimed(&submission).await {
            Ok(judged) => {
                tracing::info!(
                    submission_id = %id,
                    status = judged.status.as_str(),
                    max_time_ms = ?judged.metrics.max_time_ms,
                    "Submission judged"
                );
                if let Err(e) = self.statistics.apply(&judged).await {
                    tracing::error!(submission_id = %id, "Failed to apply statistics: {}", e);
                }
            }
            Err(JudgeError::LeaseLost) => {
                tracing::warn!(submission_id = %id, "Judging lease lost, abandoning submission");
            }
            Err(e) => {
                self.dead_letters.record(id, e.to_string());
                self.fail(id, SYSTEM_ERROR_MESSAGE).await;
            }
        }
    }

    async fn judge_claimed(&self, submission: &Submission) -> Result<Submission, JudgeError> {
        let problem = self
            .problems
            .find_problem(submission.problem_id)
            .await?
            .ok_or(JudgeError::ProblemMissing(submission.problem_id))?;
        let limits = self.limits_for(&problem);

        let _permit = self.acquire_slot().await?;
        let runner = TestRunner::new(self.sandbox.as_ref());

        let artifact = match self
            .sandbox
            .compile(&submission.source_code, submission.language, &limits)
            .await
        {
            Ok(artifact) => artifact,
            Err(CompileError::Diagnostics(diagnostics)) => {
                let judgement = judge(&CompileOutcome::Failed(diagnostics), &[]);
                return self.finalize(submission.id, &judgement).await;
            }
            Err(CompileError::Toolchain(message)) => return Err(JudgeError::Toolchain(message)),
        };

        let mut results = Vec::with_capacity(problem.test_cases.len());
        let mut failure = None;
        for (index, case) in problem.test_cases.iter().enumerate() {
            let result = match runner.run_case(&artifact, index, case, &limits).await {
                Ok(result) => result,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };
            match self.submissions.append_result(submission.id, &result).await {
                Ok(true) => {}
                Ok(false) => {
                    failure = Some(JudgeError::LeaseLost);
                    break;
                }
                Err(e) => {
                    failure = Some(e.into());
                    break;
                }
            }
            tracing::debug!(
                submission_id = %submission.id,
                test = index + 1,
                status = result.status.as_str(),
                time_ms = result.time_ms,
                "Test case finished"
            );
            results.push(result);
        }
        self.sandbox.release(artifact).await;

        if let Some(e) = failure {
            return Err(e);
        }

        let judgement = judge(&CompileOutcome::Succeeded, &results);
        self.finalize(submission.id, &judgement).await
    }

    async fn finalize(&self, id: Uuid, judgement: &Judgement) -> Result<Submission, JudgeError> {
        self.submissions
            .finalize(id, judgement)
            .await?
            .ok_or(JudgeError::LeaseLost)
    }

    /// Force a running submission into `System Error`
    async fn fail(&self, id: Uuid, message: &str) {
        match self
            .submissions
            .finalize(id, &Judgement::system_error(message))
            .await
        {
            Ok(Some(failed)) => {
                if let Err(e) = self.statistics.apply(&failed).await {
                    tracing::error!(submission_id = %id, "Failed to apply statistics: {}", e);
                }
            }
            Ok(None) => {
                tracing::warn!(submission_id = %id, "Submission already left running state");
            }
            Err(e) => {
                tracing::error!(submission_id = %id, "Failed to record system error: {}", e);
            }
        }
    }

    /// Fail expired leases and re-enqueue pending submissions
    pub async fn recover(&self) -> AppResult<()> {
        let ttl = chrono::Duration::from_std(self.config.lease_ttl())
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        let stale = self.submissions.list_stale_running(Utc::now() - ttl).await?;
        for id in &stale {
            tracing::warn!(submission_id = %id, "Judging lease expired");
            self.dead_letters.record(*id, INTERRUPTED_MESSAGE);
            self.fail(*id, INTERRUPTED_MESSAGE).await;
        }

        let pending = self.submissions.list_pending().await?;
        let mut requeued = 0;
        for id in pending {
            match self.queue.try_enqueue(id) {
                Ok(true) => requeued += 1,
                Ok(false) => {}
                Err(_) => break,
            }
        }

        if !stale.is_empty() || requeued > 0 {
            tracing::info!(stale = stale.len(), requeued, "Recovered submissions");
        }
        Ok(())
    }

    fn check_source(&self, language: &str, source_code: &str) -> AppResult<Language> {
        let language = parse_language(language)?;
        validate_source_code(source_code).map_err(AppError::Validation)?;
        if self.config.screen_source {
            screen_source(language, source_code).map_err(AppError::Validation)?;
        }
        Ok(language)
    }

    async fn find_problem(&self, problem_id: Uuid) -> AppResult<Problem> {
        self.problems
            .find_problem(problem_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Problem not found".to_string()))
    }

    fn limits_for(&self, problem: &Problem) -> ResourceLimits {
        let time_limit_ms = match problem.time_limit_ms {
            0 => self.config.default_time_limit_ms,
            ms => ms,
        };
        let memory_limit_mb = match problem.memory_limit_mb {
            0 => self.config.default_memory_limit_mb,
            mb => mb,
        };
        ResourceLimits::new(time_limit_ms, memory_limit_mb)
    }

    async fn acquire_slot(&self) -> AppResult<OwnedSemaphorePermit> {
        self.slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::Unavailable)
    }
}
