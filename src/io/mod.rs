//! Side-effecting layers: sandboxed filesystem access, subprocess execution,
//! and configuration. Isolated from `core` to keep the deterministic logic
//! mockable in tests.

pub mod config;
pub mod process;
pub mod sandbox;
