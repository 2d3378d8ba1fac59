use crate::engine::Engine;
use crate::types::{ExecutionRequest, TestCase, TestOutcome, ValidationResult};

/// Score at or above which a validation run counts as passed.
pub const PASS_THRESHOLD: u8 = 70;

/// Grades a snippet against ordered fixtures.
///
/// Every fixture is one fresh execution: new supervisor dispatch, new
/// deadline, the case's input seeded into the snippet's `input()`. A case
/// passes when the expected fragment appears as a substring of the actual
/// output - deliberately lenient, so formatting noise around the answer
/// does not fail a beginner. An empty expected fragment passes iff the
/// execution succeeded.
pub(crate) fn validate(engine: &Engine, code: &str, cases: &[TestCase]) -> ValidationResult {
    let mut test_results = Vec::with_capacity(cases.len());
    let mut passed_count = 0usize;

    for (idx, case) in cases.iter().enumerate() {
        let request = ExecutionRequest {
            code: code.to_owned(),
            submitter: "validation".to_owned(),
            input: Some(case.input_data.clone()),
            timeout: None,
        };
        let result = engine.execute(&request);

        let expected = case.expected_output.trim();
        let actual = result.output.trim().to_owned();
        let passed = if expected.is_empty() {
            result.success
        } else {
            actual.contains(expected)
        };
        if passed {
            passed_count += 1;
        }

        test_results.push(TestOutcome {
            test_number: idx + 1,
            description: case.description.clone(),
            expected: expected.to_owned(),
            actual,
            passed,
            error: result.error,
        });
    }

    let score = score_for(passed_count, cases.len());
    let feedback = feedback_for(score, passed_count, cases.len());

    ValidationResult {
        passed: score >= PASS_THRESHOLD,
        score,
        test_results,
        feedback,
    }
}

/// Score as a deterministic function of passed/total, rounded to the
/// nearest integer percentage. An empty fixture list scores zero.
fn score_for(passed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((passed as f64 / total as f64) * 100.0).round() as u8
}

/// Picks the feedback tier for a score.
///
/// Tier boundaries are inclusive at the lower edge: 70 is already the
/// good-job tier, 69 the one below it.
fn feedback_for(score: u8, passed: usize, total: usize) -> String {
    if score >= 100 {
        "Perfect! All tests passed. Excellent work!".to_owned()
    } else if score >= PASS_THRESHOLD {
        format!("Good job! {passed} out of {total} tests passed. Keep trying!")
    } else if score >= 40 {
        format!("You're making progress. {passed} tests passed. Check the failing tests and try again.")
    } else {
        format!("Don't give up! Review the test cases and your code logic. {passed} test(s) passed.")
    }
}
