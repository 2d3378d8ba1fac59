use serde::{Deserialize, Serialize};

/// A request to run one snippet in the sandbox.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionRequest {
    /// Snippet source text.
    pub code: String,
    /// Submitter identifier, used for logging and session bookkeeping.
    pub submitter: String,
    /// Pre-supplied input stream, consumed line by line by the snippet's
    /// `input()`.
    #[serde(default)]
    pub input: Option<String>,
    /// Wall-clock bound in seconds. `None` means the configured maximum;
    /// explicit values are clamped into `[1, configured_max]`.
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Structured outcome of one snippet execution.
///
/// Every failure mode of the engine is folded into these fields; `execute`
/// never propagates an error to the caller. `timed_out` and `success` are
/// mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    /// Combined stdout/stderr text, never longer than the configured
    /// maximum plus the truncation marker.
    pub output: String,
    pub error: Option<String>,
    /// Wall clock from dispatch to completion or forced termination.
    pub execution_time_ms: u64,
    pub timed_out: bool,
    pub truncated: bool,
}

/// One grading fixture for the validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub input_data: String,
    #[serde(default)]
    pub expected_output: String,
    #[serde(default)]
    pub description: String,
}

/// Outcome of a single fixture run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// 1-based position of the fixture in the submitted list.
    pub test_number: usize,
    pub description: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
    pub error: Option<String>,
}

/// Aggregate grading result for a snippet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True when `score` reached the pass threshold.
    pub passed: bool,
    /// 0-100, a deterministic function of passed/total counts.
    pub score: u8,
    /// Per-fixture outcomes in fixture order.
    pub test_results: Vec<TestOutcome>,
    pub feedback: String,
}
