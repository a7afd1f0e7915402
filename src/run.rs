//! The control loop: an explicit state machine over [`Stage`].
//!
//! One audit, then correct/validate rounds until the tests pass, the
//! iteration budget runs out, or a stage fails. Stage errors never panic the
//! caller; they land in a [`RunSummary`] with `outcome == Error`.

use anyhow::Result;
use tracing::{error, info, instrument};

use crate::analysis::lint::LintRunner;
use crate::analysis::pytest::TestRunner;
use crate::core::stage::{Stage, ValidateDecision, after_audit, after_validate, correct_entry};
use crate::core::types::{IterationState, RunOutcome, RunSummary, TestReport};
use crate::io::config::RepairConfig;
use crate::io::sandbox::Sandbox;
use crate::oracle::{BackoffPolicy, Oracle};
use crate::stages::audit::{AuditOutcome, run_audit};
use crate::stages::correct::run_correct;
use crate::stages::validate::run_validate;

/// Drive one full repair run over the sandboxed workspace.
///
/// Never returns `Err`: every failure mode is folded into the summary so the
/// caller gets one structured answer per run.
#[instrument(skip_all, fields(root = %sandbox.root().display()))]
pub fn run_repair<L, T, O>(
    sandbox: &Sandbox,
    lint: &L,
    tests: &T,
    oracle: &O,
    config: &RepairConfig,
) -> RunSummary
where
    L: LintRunner,
    T: TestRunner,
    O: Oracle,
{
    let mut state = IterationState::new(config.max_iterations);
    match drive(sandbox, lint, tests, oracle, config, &mut state) {
        Ok(summary) => summary,
        Err(err) => {
            error!(err = %format!("{err:#}"), "repair run aborted");
            RunSummary {
                success: false,
                outcome: RunOutcome::Error,
                iterations_used: state.current_iteration,
                issues_found: 0,
                issues_fixed: 0,
                tests_passed: false,
                error: Some(format!("{err:#}")),
            }
        }
    }
}

fn drive<L, T, O>(
    sandbox: &Sandbox,
    lint: &L,
    tests: &T,
    oracle: &O,
    config: &RepairConfig,
    state: &mut IterationState,
) -> Result<RunSummary>
where
    L: LintRunner,
    T: TestRunner,
    O: Oracle,
{
    let policy = BackoffPolicy::new(
        config.oracle.max_attempts,
        std::time::Duration::from_millis(config.oracle.base_delay_ms),
    );

    let mut stage = Stage::Audit;
    let mut audit = AuditOutcome::default();
    let mut issues_fixed = 0u32;
    let mut last_report = TestReport::default();
    let mut feedback: Option<TestReport> = None;
    let mut outcome = RunOutcome::Error;

    while !stage.is_terminal() {
        match stage {
            Stage::Audit => {
                audit = run_audit(sandbox, lint, tests, oracle, &policy, config)?;
                stage = after_audit(audit.findings.len());
            }
            Stage::Correct => {
                if let Some(next) = correct_entry(state) {
                    state.error = Some(format!(
                        "iteration budget of {} exhausted before correction",
                        state.max_iterations
                    ));
                    stage = next;
                    continue;
                }
                state.current_iteration += 1;
                info!(
                    iteration = state.current_iteration,
                    max = state.max_iterations,
                    "starting correction pass"
                );
                let corrected = run_correct(
                    sandbox,
                    oracle,
                    &policy,
                    &audit.plan,
                    &audit.behaviors,
                    feedback.as_ref(),
                    config,
                )?;
                issues_fixed += corrected.issues_fixed;
                stage = Stage::Validate;
            }
            Stage::Validate => {
                let validated =
                    run_validate(sandbox, tests, oracle, &policy, &audit.behaviors, config)?;
                last_report = validated.report;
                match after_validate(&last_report, state) {
                    ValidateDecision::Success => {
                        state.mission_complete = true;
                        outcome = RunOutcome::Success;
                        stage = Stage::DoneSuccess;
                    }
                    ValidateDecision::NoTests => {
                        state.error = Some("no executable tests were found".to_string());
                        outcome = RunOutcome::NoTests;
                        stage = Stage::DoneFailure;
                    }
                    ValidateDecision::RetryCorrect => {
                        feedback = Some(last_report.clone());
                        stage = Stage::Correct;
                    }
                    ValidateDecision::BudgetExhausted => {
                        state.error = Some(format!(
                            "tests still failing after {} iterations",
                            state.current_iteration
                        ));
                        outcome = RunOutcome::TestsFailing;
                        stage = Stage::DoneFailure;
                    }
                }
            }
            Stage::DoneSuccess | Stage::DoneFailure | Stage::DoneError => unreachable!(),
        }
    }

    if stage == Stage::DoneError && state.error.is_none() {
        state.error = Some("repair loop stopped in an error state".to_string());
    }
    state.should_continue = false;

    let summary = RunSummary {
        success: stage == Stage::DoneSuccess,
        outcome: if stage == Stage::DoneError {
            RunOutcome::Error
        } else {
            outcome
        },
        iterations_used: state.current_iteration,
        issues_found: audit.findings.len() as u32,
        issues_fixed,
        tests_passed: last_report.all_passing(),
        error: state.error.clone(),
    };
    info!(
        success = summary.success,
        iterations = summary.iterations_used,
        issues_found = summary.issues_found,
        issues_fixed = summary.issues_fixed,
        "repair run finished"
    );
    Ok(summary)
}
