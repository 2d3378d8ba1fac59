use chrono::{DateTime, Utc};

use crate::types::{ExecutionResult, ValidationResult};

/// Consecutive failures after which a submitter counts as struggling.
const STRUGGLE_THRESHOLD: u32 = 3;

/// Per-submitter execution statistics, owned and passed by the caller.
///
/// Collaborators that watch for struggling submitters hold one session per
/// submitter and feed every result into it. The engine itself keeps no
/// cross-request state, so sessions cannot pile up inside it or bleed
/// between submitters.
#[derive(Debug, Clone)]
pub struct SubmitterSession {
    submitter: String,
    total_runs: u32,
    consecutive_failures: u32,
    last_run: Option<DateTime<Utc>>,
}

impl SubmitterSession {
    pub fn new(submitter: impl Into<String>) -> Self {
        Self {
            submitter: submitter.into(),
            total_runs: 0,
            consecutive_failures: 0,
            last_run: None,
        }
    }

    pub fn submitter(&self) -> &str {
        &self.submitter
    }

    pub fn total_runs(&self) -> u32 {
        self.total_runs
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    /// Folds one execution result into the session.
    pub fn record(&mut self, result: &ExecutionResult) {
        self.note_run(result.success);
    }

    /// Folds one validation result into the session.
    pub fn record_validation(&mut self, result: &ValidationResult) {
        self.note_run(result.passed);
    }

    /// True once the failure streak reaches the struggle threshold.
    pub fn is_struggling(&self) -> bool {
        self.consecutive_failures >= STRUGGLE_THRESHOLD
    }

    fn note_run(&mut self, success: bool) {
        self.total_runs += 1;
        self.last_run = Some(Utc::now());
        if success {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
        }
    }
}
