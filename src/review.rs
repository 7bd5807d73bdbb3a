//! Review artifact handling: verdict extraction, archival, force-override.
//!
//! The review artifact contract: `REVIEW.md` must contain a line with a
//! case-sensitive `STATUS: PASS` or `STATUS: FAIL` token. Absence of both,
//! or absence of the artifact itself, is `PENDING` — the orchestrator never
//! infers a pass by omission. When both tokens appear, `FAIL` wins.

use crate::errors::WorkflowError;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::warn;

static PASS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*STATUS:\s*PASS\b").unwrap());

static FAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*STATUS:\s*FAIL\b").unwrap());

/// Classification extracted from the review artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewVerdict {
    Pass,
    Fail,
    Pending,
}

impl std::fmt::Display for ReviewVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewVerdict::Pass => write!(f, "PASS"),
            ReviewVerdict::Fail => write!(f, "FAIL"),
            ReviewVerdict::Pending => write!(f, "PENDING"),
        }
    }
}

/// Extract a verdict from review artifact text.
pub fn parse_verdict(text: &str) -> ReviewVerdict {
    let failed = FAIL_REGEX.is_match(text);
    let passed = PASS_REGEX.is_match(text);
    // Conservative tie-break: a FAIL token anywhere outweighs a PASS token.
    if failed {
        ReviewVerdict::Fail
    } else if passed {
        ReviewVerdict::Pass
    } else {
        ReviewVerdict::Pending
    }
}

/// Handle on the on-disk review artifact and its archive directory.
#[derive(Debug, Clone)]
pub struct ReviewArtifact {
    path: PathBuf,
    archive_dir: PathBuf,
}

impl ReviewArtifact {
    pub fn new(path: PathBuf, archive_dir: PathBuf) -> Self {
        Self { path, archive_dir }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Current verdict. `PENDING` when the artifact is absent or unreadable,
    /// which also covers the case of a `review` signal whose artifact has
    /// vanished.
    pub fn verdict(&self) -> ReviewVerdict {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => parse_verdict(&text),
            Err(_) => ReviewVerdict::Pending,
        }
    }

    /// Bullet lines from the artifact, surfaced to the operator at
    /// escalation time.
    pub fn unresolved_issues(&self) -> Vec<String> {
        let Ok(text) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        text.lines()
            .map(str::trim)
            .filter(|line| line.starts_with("- ") || line.starts_with("* "))
            .map(|line| line[2..].trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Rewrite `STATUS: FAIL` occurrences to an annotated forced pass.
    ///
    /// This is an explicit operator override; it is logged and never invoked
    /// automatically. Returns the number of rewritten tokens.
    pub fn force_pass(&self) -> Result<usize, WorkflowError> {
        let text = std::fs::read_to_string(&self.path).map_err(|_| {
            WorkflowError::ReviewArtifactMissing {
                path: self.path.clone(),
            }
        })?;

        let count = FAIL_REGEX.find_iter(&text).count();
        if count == 0 {
            return Ok(0);
        }

        let rewritten = FAIL_REGEX.replace_all(&text, "STATUS: PASS (forced)");
        std::fs::write(&self.path, rewritten.as_bytes()).map_err(|source| {
            WorkflowError::StateWriteFailed {
                path: self.path.clone(),
                source,
            }
        })?;
        warn!(
            path = %self.path.display(),
            rewritten = count,
            "operator forced review verdict to PASS"
        );
        Ok(count)
    }

    /// Move the artifact aside as `archive/REVIEW.<iteration>.md`, making the
    /// stale verdict unreachable before a re-review is dispatched.
    ///
    /// Returns the archive path, or `None` when there was no artifact.
    pub fn archive(&self, iteration: u32) -> Result<Option<PathBuf>> {
        if !self.exists() {
            return Ok(None);
        }
        std::fs::create_dir_all(&self.archive_dir).with_context(|| {
            format!(
                "Failed to create archive directory: {}",
                self.archive_dir.display()
            )
        })?;
        let dest = self.archive_dir.join(format!("REVIEW.{}.md", iteration));
        std::fs::rename(&self.path, &dest)
            .with_context(|| format!("Failed to archive {}", self.path.display()))?;
        Ok(Some(dest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_artifact() -> (ReviewArtifact, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let artifact = ReviewArtifact::new(
            dir.path().join("REVIEW.md"),
            dir.path().join("archive"),
        );
        (artifact, dir)
    }

    #[test]
    fn test_parse_pass() {
        assert_eq!(
            parse_verdict("Looks good.\nSTATUS: PASS\n"),
            ReviewVerdict::Pass
        );
    }

    #[test]
    fn test_parse_fail() {
        assert_eq!(
            parse_verdict("STATUS: FAIL\n- missing error handling\n"),
            ReviewVerdict::Fail
        );
    }

    #[test]
    fn test_parse_neither_token_is_pending() {
        assert_eq!(parse_verdict("work in progress"), ReviewVerdict::Pending);
        assert_eq!(parse_verdict(""), ReviewVerdict::Pending);
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(parse_verdict("status: pass"), ReviewVerdict::Pending);
        assert_eq!(parse_verdict("STATUS: Pass"), ReviewVerdict::Pending);
    }

    #[test]
    fn test_parse_token_must_start_a_line() {
        assert_eq!(
            parse_verdict("the reviewer wrote STATUS: PASS somewhere"),
            ReviewVerdict::Pending
        );
        assert_eq!(parse_verdict("  STATUS: PASS"), ReviewVerdict::Pass);
    }

    #[test]
    fn test_parse_both_tokens_fail_wins() {
        let text = "STATUS: PASS\nSTATUS: FAIL\n";
        assert_eq!(parse_verdict(text), ReviewVerdict::Fail);
    }

    #[test]
    fn test_verdict_pending_when_artifact_absent() {
        let (artifact, _dir) = make_artifact();
        assert!(!artifact.exists());
        assert_eq!(artifact.verdict(), ReviewVerdict::Pending);
    }

    #[test]
    fn test_verdict_reads_artifact() {
        let (artifact, _dir) = make_artifact();
        std::fs::write(artifact.path(), "STATUS: FAIL\n").unwrap();
        assert_eq!(artifact.verdict(), ReviewVerdict::Fail);
    }

    #[test]
    fn test_unresolved_issues_collects_bullets() {
        let (artifact, _dir) = make_artifact();
        std::fs::write(
            artifact.path(),
            "STATUS: FAIL\n\n- races in session store\n* missing null check\nprose line\n",
        )
        .unwrap();
        let issues = artifact.unresolved_issues();
        assert_eq!(issues, vec!["races in session store", "missing null check"]);
    }

    #[test]
    fn test_force_pass_rewrites_fail_tokens() {
        let (artifact, _dir) = make_artifact();
        std::fs::write(artifact.path(), "STATUS: FAIL\ndetails\n").unwrap();

        let rewritten = artifact.force_pass().unwrap();
        assert_eq!(rewritten, 1);

        let text = std::fs::read_to_string(artifact.path()).unwrap();
        assert!(text.contains("STATUS: PASS (forced)"));
        assert_eq!(artifact.verdict(), ReviewVerdict::Pass);
    }

    #[test]
    fn test_force_pass_on_missing_artifact_errors() {
        let (artifact, _dir) = make_artifact();
        assert!(matches!(
            artifact.force_pass(),
            Err(WorkflowError::ReviewArtifactMissing { .. })
        ));
    }

    #[test]
    fn test_force_pass_noop_without_fail_token() {
        let (artifact, _dir) = make_artifact();
        std::fs::write(artifact.path(), "STATUS: PASS\n").unwrap();
        assert_eq!(artifact.force_pass().unwrap(), 0);
    }

    #[test]
    fn test_archive_moves_artifact_aside() {
        let (artifact, dir) = make_artifact();
        std::fs::write(artifact.path(), "STATUS: FAIL\n").unwrap();

        let dest = artifact.archive(2).unwrap().unwrap();
        assert_eq!(dest, dir.path().join("archive/REVIEW.2.md"));
        assert!(!artifact.exists());
        assert_eq!(artifact.verdict(), ReviewVerdict::Pending);
        assert!(dest.is_file());
    }

    #[test]
    fn test_archive_without_artifact_is_none() {
        let (artifact, _dir) = make_artifact();
        assert!(artifact.archive(1).unwrap().is_none());
    }
}
