//! Iterative code-repair loop over a sandboxed Python workspace.
//!
//! The loop audits a workspace with external analysis tools, asks a reasoning
//! oracle for corrections, and validates them against generated tests until
//! the tests pass or the iteration budget runs out. The architecture enforces
//! a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (records, merging, output
//!   parsing, stage transitions). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (sandboxed filesystem, process
//!   execution, configuration). Isolated to enable mocking in tests.
//!
//! The [`analysis`] adapters, the [`oracle`] client, and the [`stages`] sit
//! between the two; [`run`] wires everything into the state machine.

pub mod analysis;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod oracle;
pub mod run;
pub mod stages;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
