//! Test harness: one execution per case, folded into a submission verdict

use tracing::{debug, info, instrument, warn};

use crate::judge::compare::outputs_match;
use crate::judge::{Judge, JudgeError};
use crate::types::{
    CaseReport, ExecutionResult, Submission, SubmissionVerdict, TestCase, Verdict, Visibility,
};

impl Judge {
    /// Judge a submission against every test case, in author order
    ///
    /// A host failure while running a case is recorded as an internal error
    /// for that case rather than aborting the submission.
    #[instrument(skip_all, fields(language = %submission.language, cases = submission.test_cases.len()))]
    pub async fn judge(&self, submission: &Submission) -> Result<SubmissionVerdict, JudgeError> {
        self.language(&submission.language)?;
        if submission.test_cases.is_empty() {
            return Err(JudgeError::Request(
                "submission has no test cases".to_owned(),
            ));
        }

        let harness = &self.config.harness;
        let mut per_case = Vec::with_capacity(submission.test_cases.len());
        let mut failed = false;

        for (index, case) in submission.test_cases.iter().enumerate() {
            if failed && harness.stop_on_failure && case.visibility == Visibility::Hidden {
                debug!(index, "skipping hidden case after failure");
                continue;
            }

            let mut result = match self.execute(&submission.request_for(case)).await {
                Ok(result) => result,
                Err(JudgeError::Host(err)) => {
                    warn!(index, %err, "host failure while running case");
                    ExecutionResult::failure(Verdict::InternalError, vec![err.to_string()])
                }
                Err(err) => return Err(err),
            };

            let passed = judge_case(&mut result, case, harness.float_tolerance);
            debug!(index, passed, status = %result.status, "case finished");
            failed |= !passed;

            per_case.push(CaseReport {
                index,
                visibility: case.visibility,
                passed,
                result,
            });
        }

        let verdict = aggregate(per_case, submission.test_cases.len());
        info!(
            verdict = %verdict.verdict,
            passed = verdict.passed_count,
            total = verdict.total_count,
            "submission judged"
        );
        Ok(verdict)
    }
}

/// Decide one case, downgrading a clean run with the wrong value to WRONG_ANSWER
fn judge_case(result: &mut ExecutionResult, case: &TestCase, tolerance: f64) -> bool {
    if !result.is_success() {
        return false;
    }
    let Some(expected) = &case.expected_output else {
        return true;
    };
    if outputs_match(result.stdout.as_deref(), expected, tolerance) {
        return true;
    }
    result.status = Verdict::WrongAnswer;
    false
}

/// Fold executed cases into one verdict
///
/// The most severe case status wins; see [`Verdict::severity`].
/// `total_count` counts every authored case, skipped ones included.
pub fn aggregate(per_case: Vec<CaseReport>, total_count: usize) -> SubmissionVerdict {
    let verdict = per_case
        .iter()
        .map(|report| {
            if report.passed {
                Verdict::Accepted
            } else {
                report.result.status
            }
        })
        .max_by_key(|verdict| verdict.severity())
        .unwrap_or(Verdict::Accepted);

    let passed_count = per_case.iter().filter(|report| report.passed).count();
    let average_runtime_ms = if per_case.is_empty() {
        0
    } else {
        per_case
            .iter()
            .map(|report| report.result.runtime_ms)
            .sum::<u64>()
            / per_case.len() as u64
    };

    SubmissionVerdict {
        verdict,
        passed_count,
        total_count,
        average_runtime_ms,
        per_case,
    }
}
