//! Static-analysis adapters and the workspace scan.
//!
//! The scan invokes the lint adapter per source file and the test adapter per
//! test-named file, then merges the two record sets by the naming convention.
//! One file's tool failure never aborts the rest of the batch: failures come
//! back inside records and surface as findings.

pub mod lint;
pub mod pytest;

use anyhow::Result;
use tracing::{info, instrument};

use crate::analysis::lint::{LintRequest, LintRunner};
use crate::analysis::pytest::{TestRequest, TestRunner};
use crate::core::merge::{CombinedRecord, merge_records};
use crate::io::config::RepairConfig;
use crate::io::sandbox::Sandbox;

/// Lint every source file and run every test-named file, returning one
/// combined record per file, sorted by path.
#[instrument(skip_all, fields(root = %sandbox.root().display()))]
pub fn scan_workspace<L: LintRunner, T: TestRunner>(
    sandbox: &Sandbox,
    lint: &L,
    tests: &T,
    config: &RepairConfig,
) -> Result<Vec<CombinedRecord>> {
    let sources = sandbox.list(true)?;
    let all_files = sandbox.list(false)?;
    let test_files: Vec<String> = all_files
        .into_iter()
        .filter(|file| !sources.contains(file))
        .collect();

    let lint_records = sources
        .iter()
        .map(|file| {
            lint.lint(&LintRequest {
                root: sandbox.root(),
                file,
                timeout: config.lint_timeout(),
                output_limit_bytes: config.tool_output_limit_bytes,
            })
        })
        .collect();

    let test_records = test_files
        .iter()
        .map(|file| {
            tests.run(&TestRequest {
                root: sandbox.root(),
                file,
                timeout: config.test_timeout(),
                output_limit_bytes: config.tool_output_limit_bytes,
            })
        })
        .collect();

    let combined = merge_records(lint_records, test_records);
    info!(
        sources = sources.len(),
        test_files = test_files.len(),
        combined = combined.len(),
        "workspace scan complete"
    );
    Ok(combined)
}
