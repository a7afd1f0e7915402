//! Correct stage: ask the oracle for corrected content of every planned file
//! and write it back through the sandbox.
//!
//! Partial success is the contract: a file that cannot be read, or whose
//! correction cannot be parsed, is left unmodified and reported. Only
//! oracle-level failures (retry ceiling, transport, API) abort the stage.

use anyhow::{Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::types::{ExpectedBehavior, RefactoringPlan, TestReport};
use crate::io::config::RepairConfig;
use crate::io::sandbox::Sandbox;
use crate::oracle::prompt::{CorrectionResponse, correction_prompt};
use crate::oracle::{BackoffPolicy, CallError, Oracle, call_json, extract_code_block};

/// A planned file the stage could not edit, left unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditFailure {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct CorrectOutcome {
    pub files_modified: Vec<String>,
    /// Number of individual changes the oracle reported applying.
    pub issues_fixed: u32,
    pub failures: Vec<EditFailure>,
}

/// Attempt a correction for every file in the plan.
#[instrument(skip_all, fields(files = plan.files_to_fix.len()))]
pub fn run_correct<O: Oracle>(
    sandbox: &Sandbox,
    oracle: &O,
    policy: &BackoffPolicy,
    plan: &RefactoringPlan,
    behaviors: &[ExpectedBehavior],
    feedback: Option<&TestReport>,
    config: &RepairConfig,
) -> Result<CorrectOutcome> {
    let mut outcome = CorrectOutcome::default();

    for planned in &plan.files_to_fix {
        let file = planned.file.as_str();
        if file.is_empty() {
            continue;
        }

        let current = match sandbox.read(file) {
            Ok(code) => code,
            Err(err) => {
                warn!(file, err = %err, "cannot read planned file, skipping");
                outcome.failures.push(EditFailure {
                    file: file.to_string(),
                    reason: format!("read failed: {err:#}"),
                });
                continue;
            }
        };

        let file_behaviors: Vec<ExpectedBehavior> = behaviors
            .iter()
            .filter(|behavior| behavior.file == file)
            .cloned()
            .collect();

        let prompt = correction_prompt(file, &current, &file_behaviors, &plan.summary, feedback);
        let response: CorrectionResponse = match call_json(oracle, policy, &prompt) {
            Ok(response) => response,
            Err(CallError::Parse(msg)) => {
                warn!(file, "correction response unparseable, leaving file unmodified");
                outcome.failures.push(EditFailure {
                    file: file.to_string(),
                    reason: msg,
                });
                continue;
            }
            Err(CallError::Oracle(err)) => {
                return Err(anyhow!(err).context(format!("correct {file}")));
            }
        };

        if !response.is_modified() {
            continue;
        }
        let corrected = extract_code_block(&response.corrected_code);
        if corrected == current.trim_end() || corrected == current {
            continue;
        }

        if config.backup_before_write
            && let Err(err) = sandbox.backup(file)
        {
            warn!(file, err = %err, "backup failed, writing anyway");
        }
        match sandbox.write(file, &corrected) {
            Ok(()) => {
                outcome.files_modified.push(file.to_string());
                outcome.issues_fixed += response.changes.len().max(1) as u32;
            }
            Err(err) => {
                outcome.failures.push(EditFailure {
                    file: file.to_string(),
                    reason: format!("write failed: {err:#}"),
                });
            }
        }
    }

    info!(
        modified = outcome.files_modified.len(),
        failures = outcome.failures.len(),
        "correct stage complete"
    );
    Ok(outcome)
}
