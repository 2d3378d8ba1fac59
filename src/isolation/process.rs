use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

use crate::config::EngineConfig;
use crate::interp::VmReport;

use super::child::{CHILD_MODE_FLAG, ChildJob};
use super::{IsolationSupervisor, RunOutcome, SnippetJob};

/// How often the supervisor polls the child while waiting on the deadline.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Process-backed isolation with preemptive cancellation
///
/// Each snippet runs in a freshly spawned child process: the engine binary
/// re-invoked in child mode, holding nothing but the restricted interpreter.
/// The supervisor blocks on the child up to the deadline, then sends a
/// graceful terminate signal, waits a short grace period, and force-kills
/// if the child is still alive. The OS reclaims the child's memory and
/// handles on exit either way.
pub struct ProcessSupervisor {
    /// Binary re-invoked with [`CHILD_MODE_FLAG`] for every snippet
    runner_bin: PathBuf,
    /// Delay between terminate and kill
    grace_period: Duration,
}

impl IsolationSupervisor for ProcessSupervisor {
    fn build(config: &EngineConfig) -> Result<Self> {
        let runner_bin = match &config.runner_bin {
            Some(path) => path.clone(),
            None => std::env::current_exe()
                .context("cannot resolve the engine binary for child mode")?,
        };
        if !runner_bin.is_file() {
            bail!("runner binary {} does not exist", runner_bin.display());
        }

        log::info!("ProcessSupervisor using runner binary {}", runner_bin.display());
        Ok(Self {
            runner_bin,
            grace_period: config.grace_period,
        })
    }

    fn run(&self, job: SnippetJob) -> RunOutcome {
        let started = Instant::now();

        let mut child = match self.spawn_child(&job) {
            Ok(child) => child,
            Err(e) => {
                return RunOutcome::Failed {
                    message: format!("failed to spawn snippet process: {e}"),
                    elapsed: started.elapsed(),
                };
            }
        };

        // Drain stdout on a separate thread so a chatty child cannot fill
        // the pipe and stall against our wait loop.
        let stdout = child.stdout.take();
        let reader = std::thread::spawn(move || {
            let mut buf = String::new();
            if let Some(mut stream) = stdout {
                let _ = stream.read_to_string(&mut buf);
            }
            buf
        });

        match self.wait_with_deadline(&mut child, job.timeout) {
            WaitResult::Exited(status) => {
                let elapsed = started.elapsed();
                let raw = reader.join().unwrap_or_default();
                match serde_json::from_str::<VmReport>(&raw) {
                    Ok(report) => RunOutcome::Completed { report, elapsed },
                    Err(_) => RunOutcome::Failed {
                        message: format!("snippet process produced no result ({status})"),
                        elapsed,
                    },
                }
            }
            WaitResult::DeadlineExceeded => {
                self.terminate(&mut child);
                let _ = reader.join();
                RunOutcome::TimedOut {
                    elapsed: started.elapsed(),
                }
            }
            WaitResult::WaitFailed(e) => {
                self.terminate(&mut child);
                let _ = reader.join();
                RunOutcome::Failed {
                    message: format!("failed to wait on snippet process: {e}"),
                    elapsed: started.elapsed(),
                }
            }
        }
    }
}

enum WaitResult {
    Exited(ExitStatus),
    DeadlineExceeded,
    WaitFailed(std::io::Error),
}

impl ProcessSupervisor {
    /// Spawns the child and hands it the job over stdin.
    fn spawn_child(&self, job: &SnippetJob) -> Result<Child> {
        let mut child = Command::new(&self.runner_bin)
            .arg(CHILD_MODE_FLAG)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let request = ChildJob {
            code: job.code.clone(),
            input: job.input.clone(),
            output_limit: job.output_limit,
        };
        let payload = serde_json::to_string(&request)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(payload.as_bytes())?;
        } // dropping stdin closes the pipe; the child reads to EOF

        Ok(child)
    }

    /// Blocks until the child exits or the deadline passes.
    fn wait_with_deadline(&self, child: &mut Child, timeout: Duration) -> WaitResult {
        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return WaitResult::Exited(status),
                Ok(None) => {}
                Err(e) => return WaitResult::WaitFailed(e),
            }
            if Instant::now() >= deadline {
                return WaitResult::DeadlineExceeded;
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Escalates from graceful terminate to forced kill.
    fn terminate(&self, child: &mut Child) {
        send_terminate(child);

        let grace_deadline = Instant::now() + self.grace_period;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => {}
                Err(_) => break,
            }
            if Instant::now() >= grace_deadline {
                break;
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }

        if let Err(e) = child.kill() {
            log::error!("failed to kill snippet process: {e}");
        }
        let _ = child.wait(); // reap the zombie
    }
}

#[cfg(unix)]
fn send_terminate(child: &Child) {
    // SAFETY: plain signal send to a pid we spawned; no memory is involved.
    let _ = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
}

#[cfg(not(unix))]
fn send_terminate(_child: &Child) {}
