//! The three repair passes. Each stage is a free function over the sandbox,
//! the analysis adapters, and the oracle; the loop in [`crate::run`] wires
//! them together.

pub mod audit;
pub mod correct;
pub mod validate;
