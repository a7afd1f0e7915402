//! Sandboxed file store: every read and write is confined to one workspace
//! root.
//!
//! Escapes are rejected both lexically (`..` components that climb above the
//! root) and physically (symlinks that resolve outside the canonical root).
//! Violations are the typed [`SandboxViolation`] so callers can distinguish
//! them from ordinary I/O failures via `downcast_ref`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;
use walkdir::WalkDir;

/// Suffix appended to the original relative path when backing up before an
/// overwrite.
pub const BACKUP_SUFFIX: &str = ".backup";

/// A path tried to leave the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxViolation {
    pub rel_path: String,
    pub reason: String,
}

impl std::fmt::Display for SandboxViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "path '{}' escapes the workspace root: {}",
            self.rel_path, self.reason
        )
    }
}

impl std::error::Error for SandboxViolation {}

/// Workspace-confined file store.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Open a sandbox over an existing directory. The root is canonicalized
    /// once so later descendant checks are symlink-proof.
    pub fn open(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("resolve workspace root {}", root.display()))?;
        if !root.is_dir() {
            return Err(anyhow!("workspace root {} is not a directory", root.display()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an absolute one inside the root.
    pub fn resolve(&self, rel_path: &str) -> Result<PathBuf> {
        let rel = Path::new(rel_path);
        if rel.is_absolute() {
            return Err(self.violation(rel_path, "absolute paths are not allowed"));
        }

        // Lexical check: depth must never go negative while walking
        // components, otherwise "a/../../x" would slip through a plain join.
        let mut depth = 0i64;
        for component in rel.components() {
            match component {
                Component::Normal(_) => depth += 1,
                Component::ParentDir => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(self.violation(rel_path, "'..' climbs above the root"));
                    }
                }
                Component::CurDir => {}
                Component::RootDir | Component::Prefix(_) => {
                    return Err(self.violation(rel_path, "rooted component in relative path"));
                }
            }
        }

        let joined = self.root.join(rel);

        // Physical check: canonicalize the deepest existing ancestor so a
        // symlink inside the tree cannot point writes outside it.
        let existing = deepest_existing(&joined);
        let canonical = existing
            .canonicalize()
            .with_context(|| format!("canonicalize {}", existing.display()))?;
        if !canonical.starts_with(&self.root) {
            return Err(self.violation(rel_path, "resolves outside the root via symlink"));
        }

        Ok(joined)
    }

    /// Read a file. Missing files fail with a NotFound-style error, distinct
    /// from a violation.
    pub fn read(&self, rel_path: &str) -> Result<String> {
        let abs = self.resolve(rel_path)?;
        if !abs.is_file() {
            return Err(anyhow!("file not found: {rel_path}"));
        }
        fs::read_to_string(&abs).with_context(|| format!("read {rel_path}"))
    }

    /// Write a file atomically (temp file + rename), creating parent
    /// directories as needed.
    pub fn write(&self, rel_path: &str, content: &str) -> Result<()> {
        let abs = self.resolve(rel_path)?;
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let tmp = abs.with_extension("mend.tmp");
        fs::write(&tmp, content).with_context(|| format!("write temp file for {rel_path}"))?;
        fs::rename(&tmp, &abs).with_context(|| format!("replace {rel_path}"))?;
        debug!(file = rel_path, bytes = content.len(), "wrote file");
        Ok(())
    }

    /// Copy the current content to `<rel_path>.backup` before an overwrite.
    pub fn backup(&self, rel_path: &str) -> Result<String> {
        let content = self.read(rel_path)?;
        let backup_path = format!("{rel_path}{BACKUP_SUFFIX}");
        self.write(&backup_path, &content)?;
        Ok(backup_path)
    }

    /// Enumerate all Python source files under the root, sorted by relative
    /// path. When `exclude_tests` is set, files matching the test-naming
    /// convention are skipped.
    pub fn list(&self, exclude_tests: bool) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.context("walk workspace")?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("py") {
                continue;
            }
            if exclude_tests && is_test_file(path) {
                continue;
            }
            let rel = path
                .strip_prefix(&self.root)
                .context("strip workspace prefix")?
                .to_string_lossy()
                .replace('\\', "/");
            files.push(rel);
        }
        files.sort();
        Ok(files)
    }

    fn violation(&self, rel_path: &str, reason: &str) -> anyhow::Error {
        anyhow::Error::new(SandboxViolation {
            rel_path: rel_path.to_string(),
            reason: reason.to_string(),
        })
    }
}

/// Test-file naming convention: `test_` prefix or `_test` suffix on the stem.
pub fn is_test_file(path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    stem.starts_with("test_") || stem.ends_with("_test")
}

fn deepest_existing(path: &Path) -> PathBuf {
    let mut current = path.to_path_buf();
    while !current.exists() {
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, Sandbox) {
        let temp = tempfile::tempdir().expect("tempdir");
        let sandbox = Sandbox::open(temp.path()).expect("open sandbox");
        (temp, sandbox)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_temp, sandbox) = sandbox();
        sandbox.write("pkg/calc.py", "def f():\n    return 1\n").expect("write");
        let content = sandbox.read("pkg/calc.py").expect("read");
        assert!(content.contains("return 1"));
    }

    #[test]
    fn read_missing_file_is_not_found_not_violation() {
        let (_temp, sandbox) = sandbox();
        let err = sandbox.read("absent.py").unwrap_err();
        assert!(err.downcast_ref::<SandboxViolation>().is_none());
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn parent_escape_is_rejected_and_touches_nothing() {
        let (temp, sandbox) = sandbox();
        let err = sandbox.write("../../evil.py", "malicious").unwrap_err();
        assert!(err.downcast_ref::<SandboxViolation>().is_some());

        let outside = temp.path().parent().expect("parent").join("evil.py");
        assert!(!outside.exists());
    }

    #[test]
    fn interior_dotdot_that_stays_inside_is_allowed() {
        let (_temp, sandbox) = sandbox();
        sandbox.write("a/code.py", "x = 1\n").expect("write");
        let content = sandbox.read("a/../a/code.py").expect("read through ..");
        assert_eq!(content, "x = 1\n");
    }

    #[test]
    fn absolute_path_is_rejected() {
        let (_temp, sandbox) = sandbox();
        let err = sandbox.read("/etc/passwd").unwrap_err();
        assert!(err.downcast_ref::<SandboxViolation>().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let (temp, sandbox) = sandbox();
        let outside = tempfile::tempdir().expect("outside dir");
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).expect("symlink");

        let err = sandbox.write("link/evil.py", "malicious").unwrap_err();
        assert!(err.downcast_ref::<SandboxViolation>().is_some());
        assert!(!outside.path().join("evil.py").exists());
    }

    #[test]
    fn list_excludes_test_named_files_on_request() {
        let (_temp, sandbox) = sandbox();
        sandbox.write("calc.py", "").expect("write");
        sandbox.write("test_calc.py", "").expect("write");
        sandbox.write("io_test.py", "").expect("write");
        sandbox.write("notes.txt", "").expect("write");

        let all = sandbox.list(false).expect("list");
        assert_eq!(all, vec!["calc.py", "io_test.py", "test_calc.py"]);

        let sources = sandbox.list(true).expect("list sources");
        assert_eq!(sources, vec!["calc.py"]);
    }

    #[test]
    fn backup_copies_content_with_suffix() {
        let (_temp, sandbox) = sandbox();
        sandbox.write("calc.py", "original").expect("write");
        let backup = sandbox.backup("calc.py").expect("backup");
        assert_eq!(backup, "calc.py.backup");
        assert_eq!(sandbox.read("calc.py.backup").expect("read"), "original");
    }
}
