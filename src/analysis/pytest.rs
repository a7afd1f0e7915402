//! Test-runner sub-adapter: per-file invocation of the external test tool,
//! normalized into [`TestRecord`]s.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::core::merge::{TestRecord, ToolError};
use crate::core::parse::{first_failure_line, parse_test_counts};
use crate::io::process::{SpawnError, run_command_with_timeout};

/// Parameters for one test-file invocation.
#[derive(Debug, Clone)]
pub struct TestRequest<'a> {
    pub root: &'a Path,
    /// Workspace-relative test file to run.
    pub file: &'a str,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// Abstraction over test-runner backends. Implementations never fail the
/// batch: tool problems are embedded in the returned record.
pub trait TestRunner {
    fn run(&self, request: &TestRequest<'_>) -> TestRecord;
}

/// Test adapter for `pytest`.
pub struct PytestRunner;

impl TestRunner for PytestRunner {
    #[instrument(skip_all, fields(file = request.file))]
    fn run(&self, request: &TestRequest<'_>) -> TestRecord {
        let mut cmd = Command::new("pytest");
        cmd.arg(request.file).arg("-v").current_dir(request.root);

        let output =
            match run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes) {
                Ok(output) => output,
                Err(SpawnError::NotFound) => {
                    // One degraded record instead of raising, so the batch
                    // (and the loop) can keep going and report it.
                    return degraded(request.file, ToolError::Missing);
                }
                Err(SpawnError::Other(err)) => {
                    return degraded(request.file, ToolError::Failed(format!("{err:#}")));
                }
            };

        if output.timed_out {
            return degraded(request.file, ToolError::Timeout);
        }

        let counts = parse_test_counts(&output.stdout);
        let exit_code = output.status.code();
        let errored = counts.failed > 0 || exit_code != Some(0);
        debug!(
            passed = counts.passed,
            failed = counts.failed,
            exit_code = ?exit_code,
            "test run finished"
        );
        TestRecord {
            file: request.file.to_string(),
            total_tests: counts.total(),
            passed: counts.passed,
            failed: counts.failed,
            detail: if errored {
                first_failure_line(&output.stdout)
            } else {
                String::new()
            },
            exit_code,
            tool_error: None,
        }
    }
}

fn degraded(file: &str, error: ToolError) -> TestRecord {
    TestRecord {
        file: file.to_string(),
        total_tests: 0,
        passed: 0,
        failed: 0,
        detail: error.to_string(),
        exit_code: None,
        tool_error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_record_is_flagged_not_raised() {
        let record = degraded("test_calc.py", ToolError::Timeout);
        assert_eq!(record.tool_error, Some(ToolError::Timeout));
        assert_eq!(record.total_tests, 0);
    }
}
