mod child;
mod process;
mod supervisor;
mod thread;

// Re-export the trait and the child-mode entry used by the binary
pub use child::{CHILD_MODE_FLAG, child_main};
use process::ProcessSupervisor;
pub use supervisor::IsolationSupervisor;
use thread::ThreadSupervisor;

use std::time::Duration;

use anyhow::Result;

use crate::config::{EngineConfig, IsolationMode};
use crate::interp::VmReport;

/// One snippet execution handed to a supervisor.
#[derive(Debug, Clone)]
pub struct SnippetJob {
    pub code: String,
    pub input: String,
    pub timeout: Duration,
    pub output_limit: usize,
}

/// What became of a supervised execution.
#[derive(Debug)]
pub enum RunOutcome {
    /// The snippet ran to completion, possibly raising inside the VM.
    Completed { report: VmReport, elapsed: Duration },
    /// The deadline passed before the snippet finished.
    TimedOut { elapsed: Duration },
    /// Isolation setup itself failed; fatal for this request, never retried.
    Failed { message: String, elapsed: Duration },
}

/// Creates an isolation supervisor based on configuration and platform
/// capability.
///
/// `IsolationMode::Auto` prefers process isolation, which gives true
/// preemptive cancellation, and falls back to the thread strategy only when
/// no runner binary can be resolved. The choice is made once here; the rest
/// of the engine is strategy-agnostic.
pub fn create_supervisor(config: &EngineConfig) -> Result<Box<dyn IsolationSupervisor>> {
    match config.isolation {
        IsolationMode::Process => {
            let runner = ProcessSupervisor::build(config)?;
            log::info!("ProcessSupervisor selected (full isolation mode)");
            Ok(Box::new(runner))
        }
        IsolationMode::Thread => {
            let runner = ThreadSupervisor::build(config)?;
            log::info!("ThreadSupervisor selected (in-process mode)");
            Ok(Box::new(runner))
        }
        IsolationMode::Auto => match ProcessSupervisor::build(config) {
            Ok(runner) => {
                log::info!("ProcessSupervisor selected (full isolation mode)");
                Ok(Box::new(runner))
            }
            Err(e) => {
                log::warn!("process isolation unavailable ({e}), falling back to thread isolation");
                Ok(Box::new(ThreadSupervisor::build(config)?))
            }
        },
    }
}
