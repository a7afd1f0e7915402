//! Audit stage: scan the workspace, derive findings, and ask the oracle for a
//! repair plan plus per-function expected behaviors.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::analysis::lint::LintRunner;
use crate::analysis::pytest::TestRunner;
use crate::analysis::scan_workspace;
use crate::core::merge::findings_from_records;
use crate::core::types::{ExpectedBehavior, Finding, RefactoringPlan};
use crate::io::config::RepairConfig;
use crate::io::sandbox::Sandbox;
use crate::oracle::prompt::{BehaviorsResponse, behaviors_prompt, plan_prompt};
use crate::oracle::{BackoffPolicy, Oracle, call_json};

/// Everything the audit pass produces. The plan and behaviors stay empty when
/// the workspace is clean.
#[derive(Debug, Clone, Default)]
pub struct AuditOutcome {
    pub findings: Vec<Finding>,
    pub plan: RefactoringPlan,
    pub behaviors: Vec<ExpectedBehavior>,
}

/// Run the audit pass. Oracle calls are skipped entirely when analysis finds
/// nothing, so a clean workspace goes straight to validation.
#[instrument(skip_all)]
pub fn run_audit<L, T, O>(
    sandbox: &Sandbox,
    lint: &L,
    tests: &T,
    oracle: &O,
    policy: &BackoffPolicy,
    config: &RepairConfig,
) -> Result<AuditOutcome>
where
    L: LintRunner,
    T: TestRunner,
    O: Oracle,
{
    let records = scan_workspace(sandbox, lint, tests, config)?;
    let findings = findings_from_records(&records);
    info!(findings = findings.len(), "audit scan complete");

    if findings.is_empty() {
        return Ok(AuditOutcome::default());
    }

    let plan: RefactoringPlan = call_json(oracle, policy, &plan_prompt(&findings))
        .context("request refactoring plan")?;

    // Behaviors are derived from the flagged sources; unreadable files are
    // skipped with a warning rather than failing the whole audit.
    let mut flagged: Vec<String> = plan
        .files_to_fix
        .iter()
        .map(|planned| planned.file.clone())
        .filter(|file| !file.is_empty())
        .collect();
    if flagged.is_empty() {
        flagged = findings.iter().map(|f| f.file.clone()).collect();
    }
    flagged.sort();
    flagged.dedup();

    let mut sources = Vec::new();
    for file in &flagged {
        match sandbox.read(file) {
            Ok(code) => sources.push((file.clone(), code)),
            Err(err) => warn!(file, err = %err, "skipping unreadable flagged file"),
        }
    }

    let behaviors: BehaviorsResponse =
        call_json(oracle, policy, &behaviors_prompt(&sources, &findings))
            .context("request expected behaviors")?;

    info!(
        files_to_fix = plan.files_to_fix.len(),
        behaviors = behaviors.expected_behaviors.len(),
        "audit complete"
    );
    Ok(AuditOutcome {
        findings,
        plan,
        behaviors: behaviors.expected_behaviors,
    })
}
