use std::time::Duration;

use anyhow::Result;

use crate::config::EngineConfig;
use crate::isolation::{self, IsolationSupervisor, RunOutcome, SnippetJob};
use crate::precheck;
use crate::types::{ExecutionRequest, ExecutionResult, TestCase, ValidationResult};
use crate::validator;

/// The sandboxed execution engine.
///
/// Holds the read-only configuration and the isolation strategy selected
/// once at startup. Stateless across requests: every execution gets a fresh
/// namespace, deadline, and capture buffer, and nothing of it survives the
/// returned result.
pub struct Engine {
    config: EngineConfig,
    supervisor: Box<dyn IsolationSupervisor>,
}

impl Engine {
    /// Builds an engine, selecting the isolation strategy.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let supervisor = isolation::create_supervisor(&config)?;
        Ok(Self { config, supervisor })
    }

    #[cfg(test)]
    pub(crate) fn with_supervisor(
        config: EngineConfig,
        supervisor: Box<dyn IsolationSupervisor>,
    ) -> Self {
        Self { config, supervisor }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs one snippet and returns a structured result.
    ///
    /// Every failure mode - syntax, runtime, timeout, isolation setup - is
    /// folded into the result; nothing escapes to the caller as an error.
    pub fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let timeout_secs = self.config.clamp_timeout(request.timeout);

        // Unparseable snippets never reach an isolation resource.
        if let Err(issue) = precheck::check(&request.code) {
            log::debug!(
                "snippet from {} rejected at pre-check: {}",
                request.submitter,
                issue.message
            );
            return ExecutionResult {
                success: false,
                output: String::new(),
                error: Some(format!("SyntaxError: {} (line {})", issue.message, issue.line)),
                execution_time_ms: 0,
                timed_out: false,
                truncated: false,
            };
        }

        let job = SnippetJob {
            code: request.code.clone(),
            input: request.input.clone().unwrap_or_default(),
            timeout: Duration::from_secs(timeout_secs),
            output_limit: self.config.max_output_bytes,
        };
        assemble(self.supervisor.run(job), timeout_secs)
    }

    /// Grades a snippet against ordered test fixtures.
    ///
    /// Each fixture gets its own fresh execution and deadline, so one slow
    /// case cannot eat into another's time.
    pub fn validate(&self, code: &str, cases: &[TestCase]) -> ValidationResult {
        validator::validate(self, code, cases)
    }
}

/// Maps a supervisor outcome into the caller-facing result.
///
/// Which isolation strategy produced the outcome is deliberately absent
/// from the result.
fn assemble(outcome: RunOutcome, timeout_secs: u64) -> ExecutionResult {
    match outcome {
        RunOutcome::Completed { report, elapsed } => {
            let error = report
                .error
                .map(|e| format!("{}: {}", e.kind, e.message));
            ExecutionResult {
                success: error.is_none(),
                output: report.output,
                error,
                execution_time_ms: elapsed.as_millis() as u64,
                timed_out: false,
                truncated: report.truncated,
            }
        }
        RunOutcome::TimedOut { elapsed } => ExecutionResult {
            success: false,
            output: String::new(),
            error: Some(format!(
                "TimeoutError: code execution exceeded {timeout_secs} seconds"
            )),
            execution_time_ms: elapsed.as_millis() as u64,
            timed_out: true,
            truncated: false,
        },
        RunOutcome::Failed { message, elapsed } => ExecutionResult {
            success: false,
            output: String::new(),
            error: Some(format!("ResourceError: {message}")),
            execution_time_ms: elapsed.as_millis() as u64,
            timed_out: false,
            truncated: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::interp::VmReport;

    /// Counts dispatches and answers with a canned report.
    struct CountingSupervisor {
        dispatches: Arc<AtomicU32>,
    }

    impl IsolationSupervisor for CountingSupervisor {
        fn build(_config: &EngineConfig) -> Result<Self> {
            unreachable!("constructed directly in tests")
        }

        fn run(&self, _job: SnippetJob) -> RunOutcome {
            self.dispatches.fetch_add(1, Ordering::SeqCst);
            RunOutcome::Completed {
                report: VmReport {
                    output: "ran\n".to_owned(),
                    truncated: false,
                    error: None,
                },
                elapsed: Duration::from_millis(7),
            }
        }
    }

    fn counting_engine() -> (Engine, Arc<AtomicU32>) {
        let dispatches = Arc::new(AtomicU32::new(0));
        let supervisor = CountingSupervisor {
            dispatches: dispatches.clone(),
        };
        let engine = Engine::with_supervisor(EngineConfig::default(), Box::new(supervisor));
        (engine, dispatches)
    }

    fn request(code: &str) -> ExecutionRequest {
        ExecutionRequest {
            code: code.to_owned(),
            submitter: "tester".to_owned(),
            input: None,
            timeout: None,
        }
    }

    #[test]
    fn test_precheck_failure_never_dispatches() {
        let (engine, dispatches) = counting_engine();
        let result = engine.execute(&request("def f(:"));

        assert_eq!(dispatches.load(Ordering::SeqCst), 0);
        assert!(!result.success);
        assert!(!result.timed_out);
        assert_eq!(result.execution_time_ms, 0);
        assert!(result.error.unwrap().starts_with("SyntaxError:"));
    }

    #[test]
    fn test_parseable_snippet_dispatches_once() {
        let (engine, dispatches) = counting_engine();
        let result = engine.execute(&request("print('x')"));

        assert_eq!(dispatches.load(Ordering::SeqCst), 1);
        assert!(result.success);
        assert_eq!(result.output, "ran\n");
    }

    #[test]
    fn test_assemble_timeout_excludes_success() {
        let result = assemble(
            RunOutcome::TimedOut {
                elapsed: Duration::from_millis(2_040),
            },
            2,
        );
        assert!(result.timed_out);
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("TimeoutError: code execution exceeded 2 seconds")
        );
        assert_eq!(result.execution_time_ms, 2_040);
    }

    #[test]
    fn test_assemble_runtime_error_keeps_output() {
        let result = assemble(
            RunOutcome::Completed {
                report: VmReport {
                    output: "before\n".to_owned(),
                    truncated: false,
                    error: Some(crate::interp::VmError {
                        kind: "ZeroDivisionError".to_owned(),
                        message: "division by zero".to_owned(),
                    }),
                },
                elapsed: Duration::from_millis(3),
            },
            10,
        );
        assert!(!result.success);
        assert!(!result.timed_out);
        assert_eq!(result.output, "before\n");
        assert_eq!(
            result.error.as_deref(),
            Some("ZeroDivisionError: division by zero")
        );
    }

    #[test]
    fn test_assemble_setup_failure_is_resource_error() {
        let result = assemble(
            RunOutcome::Failed {
                message: "failed to spawn snippet process: boom".to_owned(),
                elapsed: Duration::from_millis(1),
            },
            10,
        );
        assert!(!result.success);
        assert!(!result.timed_out);
        assert!(result.error.unwrap().starts_with("ResourceError:"));
    }
}
