use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use codelab::config::EngineConfig;
use codelab::engine::Engine;
use codelab::isolation;
use codelab::session::SubmitterSession;
use codelab::types::{ExecutionRequest, ExecutionResult, TestCase, ValidationResult};

#[derive(Parser)]
#[command(name = "codelab", version = "1.0", about, long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run one snippet in the sandbox
    Exec {
        /// Snippet file; reads stdin when omitted
        file: Option<PathBuf>,
        /// Wall-clock bound in seconds
        #[arg(long, short)]
        timeout: Option<u64>,
        /// Text fed to the snippet's input(), line by line
        #[arg(long)]
        input: Option<String>,
        /// Submitter identifier, used for logging
        #[arg(long, default_value = "anonymous")]
        submitter: String,
        /// Print the result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Grade a snippet against a JSON fixture file
    Validate {
        /// Snippet file; reads stdin when omitted
        file: Option<PathBuf>,
        /// Path to a JSON array of test cases
        #[arg(long)]
        tests: PathBuf,
        /// Submitter identifier, used for logging
        #[arg(long, default_value = "anonymous")]
        submitter: String,
        /// Print the result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Child mode is dispatched before any CLI parsing: the process
    // supervisor spawns this binary with the marker flag and a job on
    // stdin.
    if std::env::args().nth(1).as_deref() == Some(isolation::CHILD_MODE_FLAG) {
        return isolation::child_main();
    }

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let engine = Engine::new(EngineConfig::from_env())?;

    match cli.command {
        CliCommand::Exec {
            file,
            timeout,
            input,
            submitter,
            json,
        } => {
            let code = read_code(file.as_deref())?;
            let request = ExecutionRequest {
                code,
                submitter: submitter.clone(),
                input,
                timeout,
            };
            let result = engine.execute(&request);

            let mut session = SubmitterSession::new(submitter);
            session.record(&result);
            if !result.success {
                log::info!(
                    "submitter {} failed ({} consecutive)",
                    session.submitter(),
                    session.consecutive_failures()
                );
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_execution(&result);
            }
        }
        CliCommand::Validate {
            file,
            tests,
            submitter,
            json,
        } => {
            let code = read_code(file.as_deref())?;
            let raw = fs::read_to_string(&tests)
                .with_context(|| format!("failed to read fixtures from {}", tests.display()))?;
            let cases: Vec<TestCase> = serde_json::from_str(&raw)
                .context("fixture file must hold a JSON array of test cases")?;

            let result = engine.validate(&code, &cases);

            let mut session = SubmitterSession::new(submitter);
            session.record_validation(&result);
            if !result.passed {
                log::info!(
                    "submitter {} did not pass validation (score {})",
                    session.submitter(),
                    result.score
                );
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_validation(&result);
            }
        }
    }

    Ok(())
}

fn read_code(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read snippet from {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read snippet from stdin")?;
            Ok(buf)
        }
    }
}

fn print_execution(result: &ExecutionResult) {
    if !result.output.is_empty() {
        print!("{}", result.output);
    }
    if let Some(error) = &result.error {
        eprintln!("{error}");
    }
    log::info!(
        "execution finished in {}ms (success: {}, timed_out: {}, truncated: {})",
        result.execution_time_ms,
        result.success,
        result.timed_out,
        result.truncated
    );
}

fn print_validation(result: &ValidationResult) {
    for test in &result.test_results {
        let status = if test.passed { "PASS" } else { "FAIL" };
        println!("[{status}] test {}: {}", test.test_number, test.description);
        if !test.passed {
            println!("       expected fragment: {:?}", test.expected);
            println!("       actual output:     {:?}", test.actual);
            if let Some(error) = &test.error {
                println!("       error: {error}");
            }
        }
    }
    println!("score: {}/100", result.score);
    println!("{}", result.feedback);
}
