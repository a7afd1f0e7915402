//! Shared data contracts threaded through the repair stages.
//!
//! These types define stable contracts between the control loop, the analysis
//! adapters, and the oracle stages. Oracle-facing types are deliberately
//! tolerant: unknown keys are ignored and missing keys default, because the
//! oracle schema is advisory rather than enforced upstream.

use serde::{Deserialize, Serialize};

/// Kind of defect detected by the audit stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    SyntaxError,
    Quality,
    LogicBug,
    TestFailure,
}

/// Severity attached to a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One detected defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub file: String,
    pub kind: FindingKind,
    pub severity: Severity,
    pub description: String,
}

/// Aggregated per-file repair plan produced once per audit pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefactoringPlan {
    pub summary: String,
    pub total_issues: u32,
    pub files_to_fix: Vec<PlannedFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannedFile {
    pub file: String,
    pub priority: String,
    pub actions: Vec<PlannedAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannedAction {
    #[serde(alias = "type")]
    pub kind: String,
    pub description: String,
}

/// Oracle-derived semantic specification for one function.
///
/// Produced by the audit stage and consumed unchanged by both the correct and
/// validate stages across every iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectedBehavior {
    pub function: String,
    pub file: String,
    pub semantic_intent: String,
    pub expected_behavior: String,
    pub expected_formula: String,
    pub has_logic_bug: bool,
    pub has_quality_issue: bool,
    pub test_samples: Vec<serde_json::Value>,
}

/// One failing-test detail inside a [`TestReport`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestFailure {
    pub test_file: String,
    pub error_message: String,
    pub failed_count: u32,
    pub total_count: u32,
}

/// Aggregated result of one validate pass. Regenerated every iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    /// Workspace-relative path of the generated test artifact, when present.
    pub path: Option<String>,
    pub total_tests: u32,
    pub passed: u32,
    pub failed: u32,
    /// Sorted by test file for deterministic aggregation.
    pub failure_details: Vec<TestFailure>,
}

impl TestReport {
    pub fn all_passing(&self) -> bool {
        self.total_tests > 0 && self.failed == 0
    }
}

/// Loop-owned mutable state. Created once per run, mutated only by the
/// control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationState {
    pub current_iteration: u32,
    pub max_iterations: u32,
    pub should_continue: bool,
    pub mission_complete: bool,
    pub error: Option<String>,
}

impl IterationState {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            current_iteration: 0,
            max_iterations,
            should_continue: true,
            mission_complete: false,
            error: None,
        }
    }

    pub fn budget_exhausted(&self) -> bool {
        self.current_iteration >= self.max_iterations
    }
}

/// Final classification of a run, reported alongside [`RunSummary`].
///
/// `NoTests` is deliberately distinct from `Success`: a workspace that ends
/// with zero executable tests never counts as validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    TestsFailing,
    NoTests,
    Error,
}

/// The loop's structured output to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub success: bool,
    pub outcome: RunOutcome,
    pub iterations_used: u32,
    pub issues_found: u32,
    pub issues_fixed: u32,
    pub tests_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
