use std::time::{Duration, Instant};

use anyhow::Result;

use crate::config::EngineConfig;
use crate::interp;

use super::{IsolationSupervisor, RunOutcome, SnippetJob};

/// How often elapsed wall-clock time is checked against the deadline.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Thread-backed isolation without preemption
///
/// The snippet runs on a worker thread inside this process and the
/// supervisor polls elapsed wall-clock time cooperatively. There is no way
/// to stop the worker from here: when the deadline passes the result is
/// flagged as timed out and the worker is abandoned, still running. A
/// snippet sitting in an uninterruptible blocking operation is therefore
/// reported but not stopped. This strategy exists only for environments
/// where spawning processes is infeasible and must never win over process
/// isolation when both are available.
pub struct ThreadSupervisor;

impl IsolationSupervisor for ThreadSupervisor {
    fn build(_config: &EngineConfig) -> Result<Self> {
        log::warn!(
            "ThreadSupervisor provides advisory cancellation only - a blocking snippet is flagged, not stopped"
        );
        Ok(Self)
    }

    fn run(&self, job: SnippetJob) -> RunOutcome {
        let started = Instant::now();
        let SnippetJob {
            code,
            input,
            timeout,
            output_limit,
        } = job;

        let worker = std::thread::Builder::new()
            .name("snippet-worker".to_owned())
            .spawn(move || interp::run_snippet(&code, &input, output_limit));
        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                return RunOutcome::Failed {
                    message: format!("failed to spawn worker thread: {e}"),
                    elapsed: started.elapsed(),
                };
            }
        };

        loop {
            if worker.is_finished() {
                let elapsed = started.elapsed();
                return match worker.join() {
                    Ok(report) => RunOutcome::Completed { report, elapsed },
                    Err(_) => RunOutcome::Failed {
                        message: "snippet worker panicked".to_owned(),
                        elapsed,
                    },
                };
            }
            if started.elapsed() >= timeout {
                // The worker keeps running detached; only the result is
                // flagged.
                return RunOutcome::TimedOut {
                    elapsed: started.elapsed(),
                };
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn job(code: &str, timeout: Duration) -> SnippetJob {
        SnippetJob {
            code: code.to_owned(),
            input: String::new(),
            timeout,
            output_limit: 10_000,
        }
    }

    #[test]
    fn test_quick_snippet_completes() {
        let supervisor = ThreadSupervisor::build(&EngineConfig::default()).unwrap();
        let outcome = supervisor.run(job("print(6 * 7)", Duration::from_secs(5)));
        match outcome {
            RunOutcome::Completed { report, .. } => {
                assert!(report.error.is_none());
                assert_eq!(report.output, "42\n");
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_spinning_snippet_is_flagged_after_the_deadline() {
        let supervisor = ThreadSupervisor::build(&EngineConfig::default()).unwrap();
        let started = Instant::now();
        let outcome = supervisor.run(job("while True:\n    pass", Duration::from_millis(300)));
        match outcome {
            RunOutcome::TimedOut { elapsed } => {
                assert!(elapsed >= Duration::from_millis(300));
                assert!(started.elapsed() < Duration::from_secs(5));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
