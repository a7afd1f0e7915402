//! Repair-run configuration (`mend.toml`).
//!
//! This file is intended to be edited by humans and must remain stable and
//! automatable. Missing fields default to sensible values; a missing file is
//! the validated default configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Whether the validate stage reuses or rewrites the generated test artifact.
///
/// `Reuse` keeps an existing `test_generated.py` so the target does not move
/// between iterations; `Regenerate` rewrites it every validate pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestPolicy {
    #[default]
    Reuse,
    Regenerate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Maximum Correct↔Validate cycles before forced termination.
    pub max_iterations: u32,

    /// Per-file lint invocation timeout in seconds.
    pub lint_timeout_secs: u64,

    /// Per-file test invocation timeout in seconds.
    pub test_timeout_secs: u64,

    /// Truncate captured tool stdout/stderr beyond this many bytes.
    pub tool_output_limit_bytes: usize,

    /// Copy each file to `<file>.backup` before the correct stage overwrites
    /// it.
    pub backup_before_write: bool,

    pub test_policy: TestPolicy,

    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Model identifier sent to the generation endpoint.
    pub model: String,

    /// Base URL of the generation API.
    pub api_base: String,

    /// Attempt ceiling for rate-limited calls.
    pub max_attempts: u32,

    /// Base delay for exponential backoff, in milliseconds.
    pub base_delay_ms: u64,

    /// Sampling temperature.
    pub temperature: f64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            lint_timeout_secs: 60,
            test_timeout_secs: 120,
            tool_output_limit_bytes: 100_000,
            backup_before_write: true,
            test_policy: TestPolicy::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            max_attempts: 3,
            base_delay_ms: 5_000,
            temperature: 0.1,
        }
    }
}

impl RepairConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lint_timeout_secs == 0 || self.test_timeout_secs == 0 {
            return Err(anyhow!("tool timeouts must be > 0"));
        }
        if self.tool_output_limit_bytes == 0 {
            return Err(anyhow!("tool_output_limit_bytes must be > 0"));
        }
        if self.oracle.max_attempts == 0 {
            return Err(anyhow!("oracle.max_attempts must be > 0"));
        }
        if self.oracle.model.trim().is_empty() {
            return Err(anyhow!("oracle.model must be non-empty"));
        }
        Ok(())
    }

    pub fn lint_timeout(&self) -> Duration {
        Duration::from_secs(self.lint_timeout_secs)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }
}

/// Load config from a TOML file. A missing file returns the defaults.
pub fn load_config(path: &Path) -> Result<RepairConfig> {
    if !path.exists() {
        let cfg = RepairConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RepairConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RepairConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RepairConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("mend.toml");
        let cfg = RepairConfig {
            max_iterations: 3,
            test_policy: TestPolicy::Regenerate,
            ..RepairConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cfg = RepairConfig {
            lint_timeout_secs: 0,
            ..RepairConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
