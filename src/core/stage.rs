//! Stage-transition decisions for the repair loop.
//!
//! Pure functions over [`IterationState`] and stage results. The loop in
//! [`crate::run`] is a plain `match` over [`Stage`]; everything that decides
//! where to go next lives here so it can be tested without I/O.

use crate::core::types::{IterationState, TestReport};

/// Control-loop states. `Audit` is initial; the three `Done*` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Audit,
    Correct,
    Validate,
    DoneSuccess,
    DoneFailure,
    DoneError,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Stage::DoneSuccess | Stage::DoneFailure | Stage::DoneError
        )
    }
}

/// Where to go after an audit pass.
pub fn after_audit(findings_count: usize) -> Stage {
    if findings_count == 0 {
        // Nothing to correct; still validate so "no findings" never silently
        // bypasses the test gate.
        Stage::Validate
    } else {
        Stage::Correct
    }
}

/// Guard checked on entry to `Correct`, before any work.
///
/// Returns the stage to move to instead of correcting when the budget is
/// already exhausted. The caller increments `current_iteration` exactly once
/// after this guard passes.
pub fn correct_entry(state: &IterationState) -> Option<Stage> {
    if state.budget_exhausted() {
        return Some(Stage::DoneError);
    }
    None
}

/// Decision after a validate pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateDecision {
    Success,
    /// Zero executable tests. Terminal: further correction cannot create
    /// tests, and reporting this as success would be a lie.
    NoTests,
    /// Failing tests with budget left; loop back to `Correct` carrying the
    /// report as feedback.
    RetryCorrect,
    /// Failing tests and the budget is spent.
    BudgetExhausted,
}

pub fn after_validate(report: &TestReport, state: &IterationState) -> ValidateDecision {
    if report.all_passing() {
        return ValidateDecision::Success;
    }
    if report.total_tests == 0 {
        return ValidateDecision::NoTests;
    }
    if state.budget_exhausted() {
        return ValidateDecision::BudgetExhausted;
    }
    ValidateDecision::RetryCorrect
}
