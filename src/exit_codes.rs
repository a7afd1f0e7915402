//! Stable exit codes for the CLI.

/// Run converged: tests exist and all pass.
pub const OK: i32 = 0;
/// Run finished without convergence (failing tests, or none to run).
pub const FAILURE: i32 = 1;
/// Run aborted: configuration, oracle, or workspace error.
pub const ERROR: i32 = 2;
