//! Scrapers for the textual output of the external analysis tools.
//!
//! Parsing is an adapter-internal concern: the adapters in
//! [`crate::analysis`] expose structured records, so these regexes can change
//! with tool versions without touching the control loop.

use std::sync::OnceLock;

use regex::Regex;

fn rating_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"rated at\s*(-?[0-9]+(?:\.[0-9]+)?)/10").expect("valid rating regex")
    })
}

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s+(passed|failed)").expect("valid summary regex"))
}

const SYNTAX_MARKERS: &[&str] = &["SyntaxError", "invalid syntax", "unexpected EOF"];

/// Parsed lint output for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct LintParse {
    /// Numeric quality rating out of 10, when the tool printed one.
    pub score: Option<f64>,
    /// First human-readable remark line.
    pub remark: String,
    /// Set when the output carries a syntax-error marker, independent of the
    /// numeric rating.
    pub syntax_error: bool,
}

/// Extract rating, first remark, and syntax classification from lint output.
pub fn parse_lint_output(stdout: &str, stderr: &str) -> LintParse {
    let combined = format!("{stdout}\n{stderr}");
    let score = rating_re()
        .captures(&combined)
        .and_then(|caps| caps[1].parse::<f64>().ok());

    let mut remark = first_remark(stdout);
    if remark.is_empty() {
        remark = first_remark(stderr);
    }

    let syntax_error = SYNTAX_MARKERS.iter().any(|marker| combined.contains(marker));

    LintParse {
        score,
        remark,
        syntax_error,
    }
}

fn first_remark(text: &str) -> String {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with("********")
            || line.to_lowercase().starts_with("pylint")
            || line.contains("rated at")
        {
            continue;
        }
        return line.to_string();
    }
    String::new()
}

/// Parsed test-run output for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestCounts {
    pub passed: u32,
    pub failed: u32,
}

impl TestCounts {
    pub fn total(self) -> u32 {
        self.passed + self.failed
    }
}

/// Extract pass/fail counts from test-runner output.
///
/// Prefers the `N passed, M failed` summary line; falls back to counting
/// per-test `PASSED`/`FAILED` markers when no summary count is present.
pub fn parse_test_counts(stdout: &str) -> TestCounts {
    let mut passed = 0u32;
    let mut failed = 0u32;
    let mut saw_summary = false;

    for caps in summary_re().captures_iter(stdout) {
        let count: u32 = caps[1].parse().unwrap_or(0);
        match &caps[2] {
            "passed" => {
                passed = count;
                saw_summary = true;
            }
            "failed" => {
                failed = count;
                saw_summary = true;
            }
            _ => {}
        }
    }

    if !saw_summary {
        for line in stdout.lines() {
            if line.contains("PASSED") {
                passed += 1;
            } else if line.contains("FAILED") {
                failed += 1;
            }
        }
    }

    TestCounts { passed, failed }
}

/// First failure-ish line of test output, for compact reporting.
pub fn first_failure_line(stdout: &str) -> String {
    for line in stdout.lines() {
        let line = line.trim();
        if line.contains("FAILED") || line.contains("Error") || line.contains("assert") {
            return line.to_string();
        }
    }
    stdout.lines().next().unwrap_or_default().trim().to_string()
}
