//! Pure, deterministic logic: data contracts, stage decisions, tool-output
//! parsing, and record merging. No I/O.

pub mod merge;
pub mod parse;
pub mod stage;
pub mod types;
