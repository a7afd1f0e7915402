//! Linter sub-adapter: per-file invocation of the external lint tool,
//! normalized into [`LintRecord`]s.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::core::merge::{LintRecord, ToolError};
use crate::core::parse::parse_lint_output;
use crate::io::process::{SpawnError, run_command_with_timeout};

/// Parameters for one lint invocation.
#[derive(Debug, Clone)]
pub struct LintRequest<'a> {
    /// Workspace root; the tool runs with this as its working directory.
    pub root: &'a Path,
    /// Workspace-relative file to lint.
    pub file: &'a str,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// Abstraction over lint backends. Implementations never fail the batch: any
/// tool problem is embedded in the returned record.
pub trait LintRunner {
    fn lint(&self, request: &LintRequest<'_>) -> LintRecord;
}

/// Lint adapter for `pylint`.
pub struct PylintRunner;

impl LintRunner for PylintRunner {
    #[instrument(skip_all, fields(file = request.file))]
    fn lint(&self, request: &LintRequest<'_>) -> LintRecord {
        let mut cmd = Command::new("pylint");
        cmd.arg(request.file)
            .arg("--score=y")
            .current_dir(request.root);

        let output =
            match run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes) {
                Ok(output) => output,
                Err(SpawnError::NotFound) => {
                    return degraded(request.file, ToolError::Missing);
                }
                Err(SpawnError::Other(err)) => {
                    return degraded(request.file, ToolError::Failed(format!("{err:#}")));
                }
            };

        if output.timed_out {
            return degraded(request.file, ToolError::Timeout);
        }

        let parsed = parse_lint_output(&output.stdout, &output.stderr);
        debug!(score = ?parsed.score, syntax_error = parsed.syntax_error, "lint finished");
        LintRecord {
            file: request.file.to_string(),
            score: parsed.score,
            remark: parsed.remark,
            syntax_error: parsed.syntax_error,
            exit_code: output.status.code(),
            tool_error: None,
        }
    }
}

fn degraded(file: &str, error: ToolError) -> LintRecord {
    LintRecord {
        file: file.to_string(),
        score: None,
        remark: error.to_string(),
        syntax_error: false,
        exit_code: None,
        tool_error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_record_carries_tool_error() {
        let record = degraded("calc.py", ToolError::Missing);
        assert_eq!(record.file, "calc.py");
        assert_eq!(record.tool_error, Some(ToolError::Missing));
        assert!(record.score.is_none());
    }
}
