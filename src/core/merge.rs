//! Structured analysis records and the lint/test merge step.
//!
//! The adapters in [`crate::analysis`] emit one record per tool invocation;
//! this module joins them by the test-file naming convention and derives
//! findings from the combined view. Everything here is pure and deterministic:
//! inputs are sorted by file path before aggregation so results do not depend
//! on completion order.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::types::{Finding, FindingKind, Severity};

/// Why a tool invocation produced no usable result for a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolError {
    /// The analysis binary is not installed.
    Missing,
    /// The subprocess exceeded its time bound.
    Timeout,
    /// The subprocess crashed or could not be driven.
    Failed(String),
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolError::Missing => write!(f, "tool not installed"),
            ToolError::Timeout => write!(f, "tool timed out"),
            ToolError::Failed(msg) => write!(f, "tool failed: {msg}"),
        }
    }
}

/// Normalized lint result for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintRecord {
    pub file: String,
    pub score: Option<f64>,
    pub remark: String,
    pub syntax_error: bool,
    pub exit_code: Option<i32>,
    pub tool_error: Option<ToolError>,
}

/// Normalized test-run result for one test file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    pub file: String,
    pub total_tests: u32,
    pub passed: u32,
    pub failed: u32,
    /// First failure line, for compact feedback.
    pub detail: String,
    pub exit_code: Option<i32>,
    pub tool_error: Option<ToolError>,
}

impl TestRecord {
    /// Errored per the adapter contract: nonzero exit or any failed test.
    pub fn errored(&self) -> bool {
        self.failed > 0 || self.exit_code.is_none_or(|code| code != 0)
    }
}

/// One combined record per source file; either side may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRecord {
    pub file: String,
    pub lint: Option<LintRecord>,
    pub tests: Option<TestRecord>,
}

/// Source file a test file covers per the naming convention, if any.
///
/// `test_<name>.py` and `<name>_test.py` both map to `<name>.py`, preserving
/// any directory prefix.
pub fn covered_source(test_file: &str) -> Option<String> {
    let path = Path::new(test_file);
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?;

    let base = if let Some(rest) = stem.strip_prefix("test_") {
        rest
    } else if let Some(rest) = stem.strip_suffix("_test") {
        rest
    } else {
        return None;
    };
    if base.is_empty() {
        return None;
    }

    let name = format!("{base}.{ext}");
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Some(
            parent
                .join(name)
                .to_string_lossy()
                .replace('\\', "/"),
        ),
        _ => Some(name),
    }
}

/// Join lint and test records by the test-file naming convention.
///
/// Unmatched test-only records still produce a standalone combined record so
/// a failing orphan test never disappears from the audit.
pub fn merge_records(
    lint_records: Vec<LintRecord>,
    test_records: Vec<TestRecord>,
) -> Vec<CombinedRecord> {
    let mut tests: Vec<(Option<String>, TestRecord)> = test_records
        .into_iter()
        .map(|record| (covered_source(&record.file), record))
        .collect();

    let mut combined: Vec<CombinedRecord> = Vec::new();
    for lint in lint_records {
        let matched = tests
            .iter()
            .position(|(covered, _)| covered.as_deref() == Some(lint.file.as_str()));
        let tests_side = matched.map(|idx| tests.remove(idx).1);
        combined.push(CombinedRecord {
            file: lint.file.clone(),
            lint: Some(lint),
            tests: tests_side,
        });
    }

    for (_, record) in tests {
        combined.push(CombinedRecord {
            file: record.file.clone(),
            lint: None,
            tests: Some(record),
        });
    }

    combined.sort_by(|a, b| a.file.cmp(&b.file));
    combined
}

/// Quality ratings below this are reported as findings.
pub const QUALITY_THRESHOLD: f64 = 8.0;

/// Derive findings from combined records.
pub fn findings_from_records(records: &[CombinedRecord]) -> Vec<Finding> {
    let mut findings = Vec::new();

    for record in records {
        if let Some(lint) = &record.lint {
            if let Some(err) = &lint.tool_error {
                findings.push(Finding {
                    file: record.file.clone(),
                    kind: FindingKind::Quality,
                    severity: Severity::Low,
                    description: format!("lint unavailable: {err}"),
                });
            }
            if lint.syntax_error {
                findings.push(Finding {
                    file: record.file.clone(),
                    kind: FindingKind::SyntaxError,
                    severity: Severity::Critical,
                    description: if lint.remark.is_empty() {
                        "Syntax error detected".to_string()
                    } else {
                        lint.remark.clone()
                    },
                });
            } else if let Some(score) = lint.score
                && score < QUALITY_THRESHOLD
            {
                findings.push(Finding {
                    file: record.file.clone(),
                    kind: FindingKind::Quality,
                    severity: Severity::Medium,
                    description: format!("Code quality issues (rated {score:.2}/10): {}", lint.remark),
                });
            }
        }

        if let Some(tests) = &record.tests {
            if let Some(err) = &tests.tool_error {
                findings.push(Finding {
                    file: record.file.clone(),
                    kind: FindingKind::Quality,
                    severity: Severity::Low,
                    description: format!("test runner unavailable: {err}"),
                });
            } else if tests.errored() {
                findings.push(Finding {
                    file: record.file.clone(),
                    kind: FindingKind::TestFailure,
                    severity: Severity::High,
                    description: format!(
                        "Tests failing ({}/{} failed): {}",
                        tests.failed, tests.total_tests, tests.detail
                    ),
                });
            }
        }
    }

    findings
}
