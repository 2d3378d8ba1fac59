use anyhow::Result;

use crate::config::EngineConfig;

use super::{RunOutcome, SnippetJob};

/// Trait for the two snippet isolation strategies
///
/// This trait abstracts running one snippet under a wall-clock deadline -
/// from full process isolation with preemptive kill to a plain worker
/// thread with advisory cancellation. A supervisor instance is built once
/// at engine startup and reused for every request; all per-request state
/// lives in the job.
pub trait IsolationSupervisor: Send + Sync {
    /// Creates a supervisor instance from engine configuration
    fn build(config: &EngineConfig) -> Result<Self>
    where
        Self: Sized;

    /// Runs one snippet to completion, timeout, or setup failure
    ///
    /// Blocks the calling thread for at most the job timeout plus the
    /// termination grace period. Never blocks longer, whatever the snippet
    /// does.
    fn run(&self, job: SnippetJob) -> RunOutcome;
}
