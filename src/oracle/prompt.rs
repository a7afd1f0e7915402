//! Prompt builders and tolerant response shapes for each oracle call site.
//!
//! Prompts are plain text: fixed role/mission instructions plus serialized
//! context. Response structs default every field so an oracle that omits or
//! invents keys degrades gracefully instead of failing the stage.

use serde::Deserialize;
use serde_json::json;

use crate::core::types::{ExpectedBehavior, Finding, TestReport};

/// Ask for a structured refactoring plan from the audit findings.
pub fn plan_prompt(findings: &[Finding]) -> String {
    let findings_json =
        serde_json::to_string_pretty(findings).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are an expert code auditor.\n\
         MISSION: turn static-analysis findings into a structured repair plan.\n\n\
         === STATIC ANALYSIS FINDINGS ===\n{findings_json}\n\n\
         Respond ONLY with JSON in this shape:\n\
         {{\n\
           \"summary\": \"overall description of the problems\",\n\
           \"total_issues\": {total},\n\
           \"files_to_fix\": [\n\
             {{\"file\": \"path.py\", \"priority\": \"critical|high|medium|low\",\n\
              \"actions\": [{{\"type\": \"fix_syntax|improve_quality|fix_tests\", \"description\": \"...\"}}]}}\n\
           ]\n\
         }}",
        total = findings.len()
    )
}

/// Ask for per-function expected behaviors for the flagged files.
///
/// `files` pairs each workspace-relative path with its current source.
pub fn behaviors_prompt(files: &[(String, String)], findings: &[Finding]) -> String {
    let mut sources = String::new();
    for (file, code) in files {
        sources.push_str(&format!("--- {file} ---\n{code}\n\n"));
    }
    let findings_json =
        serde_json::to_string_pretty(findings).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are an expert code auditor.\n\
         MISSION: for every function in the flagged files, describe what it is\n\
         SUPPOSED to do, independent of what the buggy code currently does.\n\n\
         === FLAGGED SOURCE FILES ===\n{sources}\
         === FINDINGS ===\n{findings_json}\n\n\
         Respond ONLY with JSON:\n\
         {{\n\
           \"expected_behaviors\": [\n\
             {{\"function\": \"name\", \"file\": \"path.py\",\n\
              \"semantic_intent\": \"...\", \"expected_behavior\": \"...\",\n\
              \"expected_formula\": \"e.g. sum(xs)/len(xs)\",\n\
              \"has_logic_bug\": true, \"has_quality_issue\": false,\n\
              \"test_samples\": [{{\"input\": [1, 2, 3], \"expected\": 2.0}}]}}\n\
           ]\n\
         }}"
    )
}

/// Ask for the fully corrected content of one file.
pub fn correction_prompt(
    file: &str,
    code: &str,
    behaviors: &[ExpectedBehavior],
    plan_summary: &str,
    feedback: Option<&TestReport>,
) -> String {
    let behaviors_json =
        serde_json::to_string_pretty(behaviors).unwrap_or_else(|_| "[]".to_string());
    let feedback_text = match feedback {
        Some(report) if report.failed > 0 => format!(
            "\n=== TEST FEEDBACK (HIGH PRIORITY) ===\n\
             Tests failed on the previous iteration. Details:\n{}\n\
             Use this feedback to fix the remaining bugs.\n",
            serde_json::to_string_pretty(&report.failure_details)
                .unwrap_or_else(|_| "[]".to_string())
        ),
        _ => String::new(),
    };
    format!(
        "You are an expert in Python code correction.\n\
         MISSION: make this code do exactly what is expected.\n\n\
         === PLAN ===\n{plan_summary}\n\n\
         === CURRENT CODE ===\nFile: {file}\n\n```python\n{code}\n```\n\n\
         === EXPECTED BEHAVIORS ===\n{behaviors_json}\n{feedback_text}\n\
         Rules:\n\
         1. For functions with has_logic_bug=true, match expected_formula exactly.\n\
         2. For functions with has_quality_issue=true, improve internal names and\n\
            docstrings but NEVER rename the functions themselves.\n\
         3. Keep imports and untouched functions identical; return the COMPLETE file.\n\n\
         Respond ONLY with JSON:\n\
         {{\n\
           \"file\": \"{file}\",\n\
           \"status\": \"modified\" or \"unchanged\",\n\
           \"changes\": [{{\"function\": \"name\", \"type\": \"logic_fix\", \"description\": \"...\"}}],\n\
           \"corrected_code\": \"complete corrected Python source, no markdown fences\"\n\
         }}"
    )
}

/// Ask for pytest functions validating the expected behaviors.
pub fn tests_prompt(behaviors: &[ExpectedBehavior]) -> String {
    let behaviors_json =
        serde_json::to_string_pretty(behaviors).unwrap_or_else(|_| "[]".to_string());
    let names: Vec<&str> = behaviors.iter().map(|b| b.function.as_str()).collect();
    format!(
        "You are an expert in test-driven development.\n\
         MISSION: generate precise, stable pytest tests that validate the\n\
         business logic described below.\n\n\
         === EXPECTED BEHAVIORS ===\n{behaviors_json}\n\n\
         === FUNCTIONS UNDER TEST ===\n{names}\n\n\
         Rules:\n\
         1. Use EXACTLY these function names.\n\
         2. Assertions must follow expected_behavior and expected_formula.\n\
         3. Cover typical cases plus edge cases (zero, negatives, empty input);\n\
            use pytest.raises where the behavior says an error is expected.\n\
         4. Do NOT emit imports; they are added automatically.\n\n\
         Respond ONLY with JSON:\n\
         {{\"test_code\": \"pure Python test functions, no markdown fences\", \"count\": N}}",
        names = names.join(", ")
    )
}

/// Ask for a diagnosis of failing tests, to feed back into correction.
pub fn diagnosis_prompt(report: &TestReport, behaviors: &[ExpectedBehavior]) -> String {
    let report_json = serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
    let behaviors_json =
        serde_json::to_string_pretty(behaviors).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are an expert test analyst.\n\
         MISSION: diagnose why these tests fail.\n\n\
         === TEST RESULTS ===\n{report_json}\n\n\
         === EXPECTED BEHAVIORS ===\n{behaviors_json}\n\n\
         For each failing test determine the function under test, the expected\n\
         and actual values, and a precise diagnosis.\n\n\
         Respond ONLY with JSON:\n{example}",
        example = json!({
            "analysis": "overall summary",
            "failing_tests": [{
                "test_name": "test_calculate_average",
                "function": "calculate_average",
                "expected": 15,
                "actual": 30,
                "diagnosis": "missing division by len(numbers)"
            }]
        })
    )
}

/// Oracle response for the behaviors call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BehaviorsResponse {
    #[serde(alias = "behaviors")]
    pub expected_behaviors: Vec<ExpectedBehavior>,
}

/// Oracle response for one file-correction call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorrectionResponse {
    pub status: String,
    pub changes: Vec<serde_json::Value>,
    pub corrected_code: String,
}

impl CorrectionResponse {
    pub fn is_modified(&self) -> bool {
        self.status == "modified" && !self.corrected_code.trim().is_empty()
    }
}

/// Oracle response for the test-generation call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeneratedTests {
    #[serde(alias = "test_file_content")]
    pub test_code: String,
}

/// Oracle response for the failure-diagnosis call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Diagnosis {
    pub analysis: String,
    pub failing_tests: Vec<serde_json::Value>,
}
