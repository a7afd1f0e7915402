//! Validate stage: ensure the generated-test artifact exists per policy, run
//! every test-named file, aggregate a report, and diagnose failures.

use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::{info, instrument, warn};

use crate::analysis::pytest::{TestRequest, TestRunner};
use crate::core::types::{ExpectedBehavior, TestFailure, TestReport};
use crate::io::config::{RepairConfig, TestPolicy};
use crate::io::sandbox::{Sandbox, is_test_file};
use crate::oracle::prompt::{Diagnosis, GeneratedTests, diagnosis_prompt, tests_prompt};
use crate::oracle::{BackoffPolicy, CallError, Oracle, call_json, extract_code_block};

/// Generated-test artifact, colocated with the analyzed tree at its root.
pub const GENERATED_TEST_FILE: &str = "test_generated.py";

#[derive(Debug, Clone, Default)]
pub struct ValidateOutcome {
    pub report: TestReport,
    pub diagnosis: Option<Diagnosis>,
}

/// Run the validate pass.
#[instrument(skip_all)]
pub fn run_validate<T, O>(
    sandbox: &Sandbox,
    tests: &T,
    oracle: &O,
    policy: &BackoffPolicy,
    behaviors: &[ExpectedBehavior],
    config: &RepairConfig,
) -> Result<ValidateOutcome>
where
    T: TestRunner,
    O: Oracle,
{
    ensure_generated_tests(sandbox, oracle, policy, behaviors, config)?;

    let test_files: Vec<String> = sandbox
        .list(false)?
        .into_iter()
        .filter(|file| is_test_file(Path::new(file)))
        .collect();

    let mut report = TestReport::default();
    for file in &test_files {
        let record = tests.run(&TestRequest {
            root: sandbox.root(),
            file,
            timeout: config.test_timeout(),
            output_limit_bytes: config.tool_output_limit_bytes,
        });
        if let Some(err) = &record.tool_error {
            warn!(file, err = %err, "test run degraded");
            continue;
        }
        report.total_tests += record.total_tests;
        report.passed += record.passed;
        report.failed += record.failed;
        if record.errored() {
            report.failure_details.push(TestFailure {
                test_file: record.file.clone(),
                error_message: record.detail.clone(),
                failed_count: record.failed,
                total_count: record.total_tests,
            });
        }
    }
    if sandbox.resolve(GENERATED_TEST_FILE)?.is_file() {
        report.path = Some(GENERATED_TEST_FILE.to_string());
    }

    let diagnosis = if report.failed > 0 {
        diagnose(oracle, policy, &report, behaviors)
    } else {
        None
    };
    if let Some(diag) = &diagnosis {
        enrich_failure_details(&mut report, diag);
    }
    report.failure_details.sort_by(|a, b| a.test_file.cmp(&b.test_file));

    info!(
        total = report.total_tests,
        passed = report.passed,
        failed = report.failed,
        "validate stage complete"
    );
    Ok(ValidateOutcome { report, diagnosis })
}

/// Write `test_generated.py` when the policy calls for it.
///
/// `Reuse` keeps an existing artifact so corrections chase a fixed target;
/// `Regenerate` rewrites it every pass. Generation needs behaviors to work
/// from, and a parse failure degrades to running whatever tests already
/// exist.
fn ensure_generated_tests<O: Oracle>(
    sandbox: &Sandbox,
    oracle: &O,
    policy: &BackoffPolicy,
    behaviors: &[ExpectedBehavior],
    config: &RepairConfig,
) -> Result<()> {
    if behaviors.is_empty() {
        return Ok(());
    }
    let exists = sandbox.resolve(GENERATED_TEST_FILE)?.is_file();
    let generate = match config.test_policy {
        TestPolicy::Reuse => !exists,
        TestPolicy::Regenerate => true,
    };
    if !generate {
        info!(path = GENERATED_TEST_FILE, "reusing existing generated tests");
        return Ok(());
    }

    let generated: GeneratedTests = match call_json(oracle, policy, &tests_prompt(behaviors)) {
        Ok(generated) => generated,
        Err(CallError::Parse(msg)) => {
            warn!(err = %msg, "test generation unparseable, running existing tests only");
            return Ok(());
        }
        Err(CallError::Oracle(err)) => {
            return Err(anyhow!(err).context("generate tests"));
        }
    };

    let body = extract_code_block(&generated.test_code);
    if body.is_empty() {
        warn!("oracle produced no test code");
        return Ok(());
    }
    let artifact = format!("{}\n\n{body}\n", import_block(behaviors));
    sandbox.write(GENERATED_TEST_FILE, &artifact)?;
    info!(path = GENERATED_TEST_FILE, "wrote generated tests");
    Ok(())
}

/// Deterministic import block derived from the behaviors: the oracle is told
/// not to emit imports, so wrong module paths cannot break the artifact.
fn import_block(behaviors: &[ExpectedBehavior]) -> String {
    let mut imports: Vec<String> = behaviors
        .iter()
        .filter(|behavior| !behavior.function.is_empty() && !behavior.file.is_empty())
        .map(|behavior| {
            let module = behavior
                .file
                .trim_end_matches(".py")
                .replace(['/', '\\'], ".");
            format!("from {module} import {}", behavior.function)
        })
        .collect();
    imports.sort();
    imports.dedup();
    let mut block = String::from("import pytest\n");
    for import in imports {
        block.push_str(&import);
        block.push('\n');
    }
    block
}

fn diagnose<O: Oracle>(
    oracle: &O,
    policy: &BackoffPolicy,
    report: &TestReport,
    behaviors: &[ExpectedBehavior],
) -> Option<Diagnosis> {
    match call_json(oracle, policy, &diagnosis_prompt(report, behaviors)) {
        Ok(diagnosis) => Some(diagnosis),
        Err(err) => {
            // Diagnosis is best-effort feedback; the raw failure details still
            // flow back to the correct stage.
            warn!(err = %err, "failure diagnosis unavailable, using raw details");
            None
        }
    }
}

fn enrich_failure_details(report: &mut TestReport, diagnosis: &Diagnosis) {
    for entry in &diagnosis.failing_tests {
        let test_name = entry
            .get("test_name")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let text = entry
            .get("diagnosis")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if text.is_empty() {
            continue;
        }
        report.failure_details.push(TestFailure {
            test_file: test_name.to_string(),
            error_message: text.to_string(),
            failed_count: 0,
            total_count: 0,
        });
    }
}
