//! Loop-level tests driving full audit → correct → validate runs against
//! scripted adapters and a scripted oracle.

use serde_json::json;

use mend::core::types::{ExpectedBehavior, RunOutcome};
use mend::io::config::{OracleConfig, RepairConfig, TestPolicy};
use mend::oracle::{BackoffPolicy, OracleError};
use mend::run::run_repair;
use mend::stages::validate::{GENERATED_TEST_FILE, run_validate};
use mend::test_support::{
    ScriptedLint, ScriptedOracle, ScriptedTests, clean_lint, failing_tests, passing_tests,
    quality_lint, syntax_error_lint, temp_workspace,
};

fn config(max_iterations: u32) -> RepairConfig {
    RepairConfig {
        max_iterations,
        oracle: OracleConfig {
            base_delay_ms: 1,
            ..OracleConfig::default()
        },
        ..RepairConfig::default()
    }
}

fn plan_for(file: &str) -> serde_json::Value {
    json!({
        "summary": "repair the workspace",
        "total_issues": 1,
        "files_to_fix": [{
            "file": file,
            "priority": "high",
            "actions": [{"type": "fix_syntax", "description": "repair"}]
        }]
    })
}

fn no_behaviors() -> serde_json::Value {
    json!({"expected_behaviors": []})
}

fn correction_for(file: &str, code: &str) -> serde_json::Value {
    json!({
        "file": file,
        "status": "modified",
        "changes": [{"function": "avg", "type": "logic_fix", "description": "divide by len"}],
        "corrected_code": code
    })
}

#[test]
fn clean_workspace_with_passing_tests_succeeds_without_oracle() {
    let (_temp, sandbox) = temp_workspace(&[
        ("calc.py", "def avg(xs):\n    return sum(xs) / len(xs)\n"),
        ("test_calc.py", "def test_avg():\n    assert avg([2, 4]) == 3\n"),
    ]);
    let lint = ScriptedLint::new().with(clean_lint("calc.py"));
    let tests = ScriptedTests::new().with(passing_tests("test_calc.py", 2));
    let oracle = ScriptedOracle::new();

    let summary = run_repair(&sandbox, &lint, &tests, &oracle, &config(10));

    assert!(summary.success);
    assert_eq!(summary.outcome, RunOutcome::Success);
    assert_eq!(summary.iterations_used, 0);
    assert_eq!(summary.issues_found, 0);
    assert!(summary.tests_passed);
    assert_eq!(oracle.calls(), 0);
}

#[test]
fn syntax_error_without_tests_ends_as_no_tests_failure() {
    let broken = "def avg(xs:\n    return sum(xs\n";
    let fixed = "def avg(xs):\n    return sum(xs) / len(xs)\n";
    let (_temp, sandbox) = temp_workspace(&[("calc.py", broken)]);
    let lint = ScriptedLint::new().with(syntax_error_lint("calc.py", "invalid syntax"));
    let tests = ScriptedTests::new();
    let oracle = ScriptedOracle::new();
    oracle.push_json(&plan_for("calc.py"));
    oracle.push_json(&no_behaviors());
    oracle.push_json(&correction_for("calc.py", fixed));

    let summary = run_repair(&sandbox, &lint, &tests, &oracle, &config(10));

    assert!(!summary.success);
    assert_eq!(summary.outcome, RunOutcome::NoTests);
    assert_eq!(summary.iterations_used, 1);
    assert_eq!(summary.issues_found, 1);
    assert_eq!(summary.issues_fixed, 1);

    assert_eq!(sandbox.read("calc.py").expect("read"), fixed.trim_end());
    assert_eq!(sandbox.read("calc.py.backup").expect("read backup"), broken);
}

#[test]
fn correction_that_makes_tests_pass_converges_in_one_iteration() {
    let (_temp, sandbox) = temp_workspace(&[
        ("calc.py", "def avg(xs):\n    return sum(xs)\n"),
        ("test_calc.py", "def test_avg():\n    assert avg([2, 4]) == 3\n"),
    ]);
    let lint = ScriptedLint::new().with(clean_lint("calc.py"));
    let tests = ScriptedTests::new()
        .with(failing_tests("test_calc.py", 2, 1))
        .with(passing_tests("test_calc.py", 2));
    let oracle = ScriptedOracle::new();
    oracle.push_json(&plan_for("calc.py"));
    oracle.push_json(&no_behaviors());
    oracle.push_json(&correction_for(
        "calc.py",
        "def avg(xs):\n    return sum(xs) / len(xs)\n",
    ));

    let summary = run_repair(&sandbox, &lint, &tests, &oracle, &config(10));

    assert!(summary.success);
    assert_eq!(summary.outcome, RunOutcome::Success);
    assert_eq!(summary.iterations_used, 1);
    assert!(summary.tests_passed);
}

#[test]
fn budget_of_one_allows_exactly_one_correction_pass() {
    let (_temp, sandbox) = temp_workspace(&[
        ("calc.py", "def avg(xs):\n    return sum(xs)\n"),
        ("test_calc.py", "def test_avg():\n    assert avg([2, 4]) == 3\n"),
    ]);
    let lint = ScriptedLint::new().with(clean_lint("calc.py"));
    let tests = ScriptedTests::new().with(failing_tests("test_calc.py", 2, 1));
    let oracle = ScriptedOracle::new();
    oracle.push_json(&plan_for("calc.py"));
    oracle.push_json(&no_behaviors());
    oracle.push_json(&correction_for(
        "calc.py",
        "def avg(xs):\n    return sum(xs) / len(xs)\n",
    ));
    oracle.push_json(&json!({
        "analysis": "avg still wrong",
        "failing_tests": [{"test_name": "test_avg", "diagnosis": "missing division by len"}]
    }));

    let summary = run_repair(&sandbox, &lint, &tests, &oracle, &config(1));

    assert!(!summary.success);
    assert_eq!(summary.outcome, RunOutcome::TestsFailing);
    assert_eq!(summary.iterations_used, 1);
    assert!(!summary.tests_passed);

    let correction_prompts = oracle
        .prompts()
        .iter()
        .filter(|prompt| prompt.contains("code correction"))
        .count();
    assert_eq!(correction_prompts, 1);
}

#[test]
fn second_correction_pass_carries_test_feedback() {
    let (_temp, sandbox) = temp_workspace(&[
        ("calc.py", "def avg(xs):\n    return sum(xs)\n"),
        ("test_calc.py", "def test_avg():\n    assert avg([2, 4]) == 3\n"),
    ]);
    let lint = ScriptedLint::new().with(clean_lint("calc.py"));
    let tests = ScriptedTests::new()
        .with(failing_tests("test_calc.py", 2, 1))
        .with(failing_tests("test_calc.py", 2, 1))
        .with(passing_tests("test_calc.py", 2));
    let oracle = ScriptedOracle::new();
    oracle.push_json(&plan_for("calc.py"));
    oracle.push_json(&no_behaviors());
    oracle.push_json(&correction_for("calc.py", "def avg(xs):\n    return sum(xs) - 1\n"));
    oracle.push_json(&json!({
        "analysis": "avg still wrong",
        "failing_tests": [{"test_name": "test_avg", "diagnosis": "missing division by len"}]
    }));
    oracle.push_json(&correction_for(
        "calc.py",
        "def avg(xs):\n    return sum(xs) / len(xs)\n",
    ));

    let summary = run_repair(&sandbox, &lint, &tests, &oracle, &config(10));

    assert!(summary.success);
    assert_eq!(summary.iterations_used, 2);

    let prompts = oracle.prompts();
    let feedback_prompts: Vec<&String> = prompts
        .iter()
        .filter(|prompt| prompt.contains("TEST FEEDBACK"))
        .collect();
    assert_eq!(feedback_prompts.len(), 1);
    assert!(feedback_prompts[0].contains("code correction"));
}

#[test]
fn oracle_failure_aborts_the_run_as_an_error() {
    let (_temp, sandbox) = temp_workspace(&[("calc.py", "x = 1\n")]);
    let lint = ScriptedLint::new().with(quality_lint("calc.py", 4.0));
    let tests = ScriptedTests::new();
    let oracle = ScriptedOracle::new();
    oracle.push_err(OracleError::Api {
        status: 400,
        message: "bad request".to_string(),
    });

    let summary = run_repair(&sandbox, &lint, &tests, &oracle, &config(10));

    assert!(!summary.success);
    assert_eq!(summary.outcome, RunOutcome::Error);
    assert!(summary.error.as_deref().is_some_and(|e| e.contains("refactoring plan")));
}

#[test]
fn plan_escaping_the_sandbox_modifies_nothing_outside() {
    let (temp, sandbox) = temp_workspace(&[("calc.py", "x = 1\n")]);
    let lint = ScriptedLint::new().with(quality_lint("calc.py", 4.0));
    let tests = ScriptedTests::new();
    let oracle = ScriptedOracle::new();
    oracle.push_json(&plan_for("../../evil.py"));
    oracle.push_json(&no_behaviors());

    let summary = run_repair(&sandbox, &lint, &tests, &oracle, &config(10));

    assert!(!summary.success);
    assert_eq!(summary.issues_fixed, 0);
    // Only the plan and behaviors calls happened; no correction was attempted.
    assert_eq!(oracle.calls(), 2);

    let outside = temp.path().parent().expect("parent").join("evil.py");
    assert!(!outside.exists());
}

#[test]
fn validate_generates_tests_from_behaviors_when_none_exist() {
    let fixed = "def avg(xs):\n    return sum(xs) / len(xs)\n";
    let (_temp, sandbox) = temp_workspace(&[("calc.py", "def avg(xs):\n    return sum(xs)\n")]);
    let lint = ScriptedLint::new().with(quality_lint("calc.py", 4.0));
    let tests = ScriptedTests::new().with(passing_tests(GENERATED_TEST_FILE, 1));
    let oracle = ScriptedOracle::new();
    oracle.push_json(&plan_for("calc.py"));
    oracle.push_json(&json!({
        "expected_behaviors": [{
            "function": "avg",
            "file": "calc.py",
            "expected_formula": "sum(xs) / len(xs)",
            "has_logic_bug": true
        }]
    }));
    oracle.push_json(&correction_for("calc.py", fixed));
    oracle.push_json(&json!({
        "test_code": "def test_avg():\n    assert avg([1, 2, 3]) == 2\n",
        "count": 1
    }));

    let summary = run_repair(&sandbox, &lint, &tests, &oracle, &config(10));

    assert!(summary.success);
    assert_eq!(oracle.calls(), 4);

    let generated = sandbox.read(GENERATED_TEST_FILE).expect("read generated tests");
    assert!(generated.starts_with("import pytest\nfrom calc import avg\n"));
    assert!(generated.contains("def test_avg"));
}

#[test]
fn reuse_policy_keeps_the_existing_generated_tests() {
    let (_temp, sandbox) = temp_workspace(&[
        ("calc.py", "def avg(xs):\n    return sum(xs) / len(xs)\n"),
        (GENERATED_TEST_FILE, "def test_avg():\n    assert True\n"),
    ]);
    let tests = ScriptedTests::new().with(passing_tests(GENERATED_TEST_FILE, 1));
    let oracle = ScriptedOracle::new();
    let behaviors = vec![ExpectedBehavior {
        function: "avg".to_string(),
        file: "calc.py".to_string(),
        ..ExpectedBehavior::default()
    }];
    let policy = BackoffPolicy::new(3, std::time::Duration::from_millis(1));

    let outcome = run_validate(&sandbox, &tests, &oracle, &policy, &behaviors, &config(10))
        .expect("validate");

    assert_eq!(oracle.calls(), 0);
    assert!(outcome.report.all_passing());
    assert_eq!(outcome.report.path.as_deref(), Some(GENERATED_TEST_FILE));
}

#[test]
fn regenerate_policy_rewrites_the_artifact_every_pass() {
    let (_temp, sandbox) = temp_workspace(&[
        ("calc.py", "def avg(xs):\n    return sum(xs) / len(xs)\n"),
        (GENERATED_TEST_FILE, "def test_stale():\n    assert True\n"),
    ]);
    let tests = ScriptedTests::new().with(passing_tests(GENERATED_TEST_FILE, 1));
    let oracle = ScriptedOracle::new();
    oracle.push_json(&json!({
        "test_code": "def test_avg():\n    assert avg([2, 4]) == 3\n",
        "count": 1
    }));
    let behaviors = vec![ExpectedBehavior {
        function: "avg".to_string(),
        file: "calc.py".to_string(),
        ..ExpectedBehavior::default()
    }];
    let policy = BackoffPolicy::new(3, std::time::Duration::from_millis(1));
    let regen = RepairConfig {
        test_policy: TestPolicy::Regenerate,
        ..config(10)
    };

    run_validate(&sandbox, &tests, &oracle, &policy, &behaviors, &regen).expect("validate");

    assert_eq!(oracle.calls(), 1);
    let generated = sandbox.read(GENERATED_TEST_FILE).expect("read");
    assert!(generated.contains("def test_avg"));
    assert!(!generated.contains("test_stale"));
}
