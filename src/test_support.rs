//! Test-only scripted adapters and workspace fixtures.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use crate::analysis::lint::{LintRequest, LintRunner};
use crate::analysis::pytest::{TestRequest, TestRunner};
use crate::core::merge::{LintRecord, TestRecord};
use crate::io::sandbox::Sandbox;
use crate::oracle::{Oracle, OracleError};

/// Create a sandboxed workspace populated with the given relative files.
pub fn temp_workspace(files: &[(&str, &str)]) -> (tempfile::TempDir, Sandbox) {
    let temp = tempfile::tempdir().expect("tempdir");
    let sandbox = Sandbox::open(temp.path()).expect("open sandbox");
    for (path, content) in files {
        sandbox.write(path, content).expect("seed workspace file");
    }
    (temp, sandbox)
}

/// Oracle returning a scripted sequence of responses, recording every prompt.
#[derive(Default)]
pub struct ScriptedOracle {
    responses: RefCell<VecDeque<Result<String, OracleError>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, response: &str) {
        self.responses.borrow_mut().push_back(Ok(response.to_string()));
    }

    pub fn push_json(&self, response: &serde_json::Value) {
        self.responses
            .borrow_mut()
            .push_back(Ok(response.to_string()));
    }

    pub fn push_err(&self, err: OracleError) {
        self.responses.borrow_mut().push_back(Err(err));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl Oracle for ScriptedOracle {
    fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        // An exhausted script is a test bug; EmptyResponse makes it visible
        // without panicking inside the loop under test.
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(OracleError::EmptyResponse))
    }
}

/// Clean lint record: perfect score, no remarks.
pub fn clean_lint(file: &str) -> LintRecord {
    LintRecord {
        file: file.to_string(),
        score: Some(10.0),
        remark: String::new(),
        syntax_error: false,
        exit_code: Some(0),
        tool_error: None,
    }
}

/// Lint record flagging a syntax error.
pub fn syntax_error_lint(file: &str, remark: &str) -> LintRecord {
    LintRecord {
        file: file.to_string(),
        score: None,
        remark: remark.to_string(),
        syntax_error: true,
        exit_code: Some(2),
        tool_error: None,
    }
}

/// Lint record with a below-threshold quality score.
pub fn quality_lint(file: &str, score: f64) -> LintRecord {
    LintRecord {
        score: Some(score),
        remark: "poorly named variables".to_string(),
        ..clean_lint(file)
    }
}

/// Fully passing test record.
pub fn passing_tests(file: &str, total: u32) -> TestRecord {
    TestRecord {
        file: file.to_string(),
        total_tests: total,
        passed: total,
        failed: 0,
        detail: String::new(),
        exit_code: Some(0),
        tool_error: None,
    }
}

/// Test record with failures.
pub fn failing_tests(file: &str, total: u32, failed: u32) -> TestRecord {
    TestRecord {
        file: file.to_string(),
        total_tests: total,
        passed: total - failed,
        failed,
        detail: "FAILED test_calc.py::test_avg - assert 30 == 15".to_string(),
        exit_code: Some(1),
        tool_error: None,
    }
}

/// Lint adapter answering from a fixed per-file table.
///
/// Files without an entry come back clean, so fixtures only script the
/// interesting records.
#[derive(Default)]
pub struct ScriptedLint {
    by_file: HashMap<String, LintRecord>,
}

impl ScriptedLint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, record: LintRecord) -> Self {
        self.by_file.insert(record.file.clone(), record);
        self
    }
}

impl LintRunner for ScriptedLint {
    fn lint(&self, request: &LintRequest<'_>) -> LintRecord {
        self.by_file
            .get(request.file)
            .cloned()
            .unwrap_or_else(|| clean_lint(request.file))
    }
}

/// Test adapter answering from per-file response queues.
///
/// Each `run` pops the next scripted record for that file; the last one
/// repeats, so "fail once then pass" takes a two-record queue.
#[derive(Default)]
pub struct ScriptedTests {
    by_file: RefCell<HashMap<String, VecDeque<TestRecord>>>,
}

impl ScriptedTests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, record: TestRecord) -> Self {
        self.by_file
            .borrow_mut()
            .entry(record.file.clone())
            .or_default()
            .push_back(record);
        self
    }
}

impl TestRunner for ScriptedTests {
    fn run(&self, request: &TestRequest<'_>) -> TestRecord {
        let mut by_file = self.by_file.borrow_mut();
        match by_file.get_mut(request.file) {
            Some(queue) if queue.len() > 1 => queue.pop_front().expect("non-empty queue"),
            Some(queue) => queue.front().cloned().expect("non-empty queue"),
            None => passing_tests(request.file, 1),
        }
    }
}
