//! Verdict resolution
//!
//! The final status is a pure function of whether compilation failed and of
//! the multiset of per-test outcomes. Precedence, highest first:
//! compilation error, timeout, runtime error, wrong answer, accepted.

use serde::Serialize;

use crate::{
    constants::MAX_DIAGNOSTIC_LENGTH,
    models::{ExecutionMetrics, Judgement, SubmissionStatus, TestResult, TestResultStatus},
    sandbox::output::truncate_chars,
};

/// Whether the compile step produced an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Succeeded,
    Failed(String),
}

/// Reduce per-test outcomes to one final status
pub fn resolve<I>(compile: &CompileOutcome, outcomes: I) -> SubmissionStatus
where
    I: IntoIterator<Item = TestResultStatus>,
{
    if matches!(compile, CompileOutcome::Failed(_)) {
        return SubmissionStatus::CompilationError;
    }

    let (mut timeout, mut error, mut failed) = (false, false, false);
    for outcome in outcomes {
        match outcome {
            TestResultStatus::Timeout => timeout = true,
            TestResultStatus::Error => error = true,
            TestResultStatus::Failed => failed = true,
            TestResultStatus::Passed => {}
        }
    }

    if timeout {
        SubmissionStatus::TimeLimitExceeded
    } else if error {
        SubmissionStatus::RuntimeError
    } else if failed {
        SubmissionStatus::WrongAnswer
    } else {
        SubmissionStatus::Accepted
    }
}

/// Final status plus the bounded detail string and metrics to persist
pub fn judge(compile: &CompileOutcome, results: &[TestResult]) -> Judgement {
    let status = resolve(compile, results.iter().map(|r| r.status));
    Judgement {
        status,
        error_detail: error_detail(status, compile, results),
        metrics: ExecutionMetrics::from_results(results),
    }
}

/// User-facing explanation for a non-accepted status
pub fn error_detail(
    status: SubmissionStatus,
    compile: &CompileOutcome,
    results: &[TestResult],
) -> Option<String> {
    let first = |kind: TestResultStatus| results.iter().find(|r| r.status == kind);

    let detail = match status {
        SubmissionStatus::CompilationError => match compile {
            CompileOutcome::Failed(diagnostics) => diagnostics.clone(),
            CompileOutcome::Succeeded => return None,
        },
        SubmissionStatus::TimeLimitExceeded => {
            let result = first(TestResultStatus::Timeout)?;
            format!("Time limit exceeded on test {}", result.index + 1)
        }
        SubmissionStatus::RuntimeError => {
            let result = first(TestResultStatus::Error)?;
            match &result.error_message {
                Some(message) => format!("Runtime error on test {}: {}", result.index + 1, message),
                None => format!("Runtime error on test {}", result.index + 1),
            }
        }
        SubmissionStatus::WrongAnswer => {
            let result = first(TestResultStatus::Failed)?;
            format!("Wrong answer on test {}", result.index + 1)
        }
        _ => return None,
    };

    Some(truncate_chars(&detail, MAX_DIAGNOSTIC_LENGTH))
}

/// Counts shown to pollers and preview callers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub errored: usize,
}

impl TestSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        results.iter().fold(
            Self {
                total: results.len(),
                ..Default::default()
            },
            |mut summary, result| {
                match result.status {
                    TestResultStatus::Passed => summary.passed += 1,
                    TestResultStatus::Failed => summary.failed += 1,
                    TestResultStatus::Timeout => summary.timed_out += 1,
                    TestResultStatus::Error => summary.errored += 1,
                }
                summary
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestResultStatus::*;

    fn resolved(outcomes: &[TestResultStatus]) -> SubmissionStatus {
        resolve(&CompileOutcome::Succeeded, outcomes.iter().copied())
    }

    #[test]
    fn test_precedence() {
        assert_eq!(resolved(&[Passed, Passed, Passed]), SubmissionStatus::Accepted);
        assert_eq!(resolved(&[Passed, Failed]), SubmissionStatus::WrongAnswer);
        assert_eq!(resolved(&[Failed, Error]), SubmissionStatus::RuntimeError);
        assert_eq!(resolved(&[Error, Failed, Timeout]), SubmissionStatus::TimeLimitExceeded);
        assert_eq!(
            resolve(&CompileOutcome::Failed("x".into()), [Timeout]),
            SubmissionStatus::CompilationError
        );
    }

    #[test]
    fn test_empty_result_set_is_accepted() {
        assert_eq!(resolved(&[]), SubmissionStatus::Accepted);
    }

    #[test]
    fn test_resolution_is_order_independent() {
        let kinds = [Passed, Failed, Timeout, Error];
        // Every subset, every rotation of it
        for mask in 0u8..16 {
            let subset: Vec<_> = kinds
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, kind)| *kind)
                .collect();
            let expected = resolved(&subset);
            for shift in 0..subset.len() {
                let mut rotated = subset.clone();
                rotated.rotate_left(shift);
                assert_eq!(resolved(&rotated), expected, "{rotated:?}");
                rotated.reverse();
                assert_eq!(resolved(&rotated), expected, "{rotated:?}");
            }
        }
    }

    #[test]
    fn test_detail_points_at_first_failure() {
        let results = vec![
            TestResult::passed(0, "1".into(), 5, None),
            TestResult::failed(1, "2".into(), 5, None),
            TestResult::error(2, String::new(), 5, None, "exit code 1".into()),
            TestResult::failed(3, "4".into(), 5, None),
        ];
        let judgement = judge(&CompileOutcome::Succeeded, &results);
        assert_eq!(judgement.status, SubmissionStatus::RuntimeError);
        assert_eq!(
            judgement.error_detail.as_deref(),
            Some("Runtime error on test 3: exit code 1")
        );
        assert_eq!(judgement.metrics.max_time_ms, Some(5));
    }

    #[test]
    fn test_compile_failure_detail_is_the_diagnostic() {
        let compile = CompileOutcome::Failed("solution.c:1: error".into());
        let judgement = judge(&compile, &[]);
        assert_eq!(judgement.status, SubmissionStatus::CompilationError);
        assert_eq!(judgement.error_detail.as_deref(), Some("solution.c:1: error"));
    }

    #[test]
    fn test_accepted_has_no_detail() {
        let results = vec![TestResult::passed(0, "1".into(), 5, None)];
        assert_eq!(judge(&CompileOutcome::Succeeded, &results).error_detail, None);
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            TestResult::passed(0, "1".into(), 5, None),
            TestResult::timeout(1, 1000),
            TestResult::failed(2, "x".into(), 5, None),
        ];
        let summary = TestSummary::from_results(&results);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errored, 0);
    }
}
