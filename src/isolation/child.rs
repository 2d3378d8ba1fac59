use std::io::{Read, Write};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::interp;

/// Argv marker that switches the binary into child mode.
pub const CHILD_MODE_FLAG: &str = "__snippet-child";

/// Job payload the process supervisor writes to the child's stdin.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChildJob {
    pub code: String,
    pub input: String,
    pub output_limit: usize,
}

/// Child-mode entry point: one job on stdin, one report on stdout.
///
/// The snippet's own output never reaches the real stdout; it is captured
/// inside the VM and carried in the report. The deadline is enforced by
/// the parent, which escalates from terminate to kill when it passes.
pub fn child_main() -> Result<()> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read job from stdin")?;
    let job: ChildJob = serde_json::from_str(&raw).context("malformed job payload")?;

    let report = interp::run_snippet(&job.code, &job.input, job.output_limit);

    let payload = serde_json::to_string(&report).context("failed to encode report")?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(payload.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_job_round_trips_as_json() {
        let job = ChildJob {
            code: "print('hi')".to_owned(),
            input: "line\n".to_owned(),
            output_limit: 10_000,
        };
        let raw = serde_json::to_string(&job).unwrap();
        let back: ChildJob = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.code, job.code);
        assert_eq!(back.input, job.input);
        assert_eq!(back.output_limit, job.output_limit);
    }
}
