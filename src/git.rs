//! Git lifecycle automation tied to phase transitions.
//!
//! Local operations (branching, staging, committing) go through libgit2.
//! Publishing shells out to the `git` and `gh` CLIs so that network and
//! credential handling stay with the user's own tooling and failures surface
//! the tool's own message verbatim.
//!
//! Every operation is idempotent and no-op-safe: committing with a clean
//! stage does nothing, branching while already on a feature branch reuses
//! it, and publishing refuses to run with zero commits ahead of trunk.

use crate::errors::GitError;
use crate::layout::WORKFLOW_DIR;
use anyhow::Context;
use git2::{BranchType, IndexAddOption, Repository, Signature, build::CheckoutBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Which phase boundary a commit marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    PlanAccepted,
    ImplementationComplete,
    RefinementComplete,
    Checkpoint,
    FinalCleanup,
}

impl CommitKind {
    fn label(&self) -> &'static str {
        match self {
            CommitKind::PlanAccepted => "plan",
            CommitKind::ImplementationComplete => "implement",
            CommitKind::RefinementComplete => "refine",
            CommitKind::Checkpoint => "checkpoint",
            CommitKind::FinalCleanup => "cleanup",
        }
    }
}

/// Active branch bookkeeping, persisted so a crashed session can resume or
/// cleanly abort.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BranchState {
    pub feature_branch: String,
    pub previous_branch: String,
}

impl BranchState {
    /// Load persisted branch state; `None` when absent or corrupt.
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize branch state")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write branch state: {}", path.display()))?;
        Ok(())
    }
}

/// Outcome of a successful publish.
#[derive(Debug)]
pub struct PublishOutcome {
    pub branch: String,
    pub commits_ahead: usize,
}

pub struct GitLifecycle {
    repo: Repository,
    workdir: PathBuf,
    trunk: String,
}

impl GitLifecycle {
    pub fn new(project_dir: &Path, trunk_override: Option<&str>) -> Result<Self, GitError> {
        let repo = Repository::open(project_dir).map_err(|_| GitError::NotARepository {
            path: project_dir.to_path_buf(),
        })?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::NotARepository {
                path: project_dir.to_path_buf(),
            })?
            .to_path_buf();
        let trunk = match trunk_override {
            Some(name) => name.to_string(),
            None => detect_trunk(&repo),
        };
        Ok(Self {
            repo,
            workdir,
            trunk,
        })
    }

    pub fn trunk(&self) -> &str {
        &self.trunk
    }

    /// Shorthand name of the currently checked-out branch.
    pub fn current_branch(&self) -> Result<String, GitError> {
        let head = self.repo.head()?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }

    /// Branch off for a feature, or reuse the branch we are already on.
    ///
    /// Only branches when currently on trunk; any other branch is assumed to
    /// be a deliberately chosen working branch. Re-invoking with the same
    /// name is a no-op returning the same state.
    pub fn create_feature_branch(&self, name: &str) -> Result<BranchState, GitError> {
        let current = self.current_branch()?;
        if current != self.trunk {
            debug!(branch = current.as_str(), "already off trunk; reusing branch");
            return Ok(BranchState {
                feature_branch: current.clone(),
                previous_branch: current,
            });
        }

        let branch_name = format!("feature/{}", slugify(name));
        let head_commit = self.repo.head()?.peel_to_commit()?;

        if self
            .repo
            .find_branch(&branch_name, BranchType::Local)
            .is_err()
        {
            self.repo.branch(&branch_name, &head_commit, false)?;
        }

        self.repo
            .set_head(&format!("refs/heads/{}", branch_name))?;
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().safe()))?;

        info!(branch = branch_name.as_str(), from = current.as_str(), "created feature branch");
        Ok(BranchState {
            feature_branch: branch_name,
            previous_branch: current,
        })
    }

    /// Stage everything except the orchestrator's own state directory and
    /// commit if the stage is non-empty.
    ///
    /// Returns the new commit id, or `None` when there was nothing to
    /// commit.
    pub fn commit_phase(
        &self,
        kind: CommitKind,
        description: &str,
    ) -> Result<Option<String>, GitError> {
        let mut index = self.repo.index()?;

        let mut skip_state_dir = |path: &Path, _matched: &[u8]| -> i32 {
            if path.starts_with(WORKFLOW_DIR) { 1 } else { 0 }
        };
        index.add_all(
            ["*"].iter(),
            IndexAddOption::DEFAULT,
            Some(&mut skip_state_dir),
        )?;
        index.update_all(["*"].iter(), Some(&mut skip_state_dir))?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.signature()?;

        let commit_id = match self.head_commit() {
            Some(parent) => {
                if parent.tree_id() == tree_id {
                    debug!(kind = kind.label(), "stage is clean; skipping commit");
                    return Ok(None);
                }
                self.repo.commit(
                    Some("HEAD"),
                    &sig,
                    &sig,
                    &format!("[cadence] {}: {}", kind.label(), description),
                    &tree,
                    &[&parent],
                )?
            }
            None => {
                if tree.is_empty() {
                    return Ok(None);
                }
                self.repo.commit(
                    Some("HEAD"),
                    &sig,
                    &sig,
                    &format!("[cadence] {}: {}", kind.label(), description),
                    &tree,
                    &[],
                )?
            }
        };

        info!(kind = kind.label(), commit = %commit_id, "committed phase boundary");
        Ok(Some(commit_id.to_string()))
    }

    /// Number of commits on HEAD that trunk does not have.
    pub fn commits_ahead_of_trunk(&self) -> Result<usize, GitError> {
        let head_oid = self
            .repo
            .head()?
            .peel_to_commit()?
            .id();
        let trunk_oid = self
            .repo
            .find_branch(&self.trunk, BranchType::Local)?
            .get()
            .peel_to_commit()?
            .id();
        let (ahead, _behind) = self.repo.graph_ahead_behind(head_oid, trunk_oid)?;
        Ok(ahead)
    }

    /// Commit residual changes, push the feature branch, and open a change
    /// request with the generated summary.
    ///
    /// Fails loudly before any network operation when there is nothing to
    /// publish; a push or `gh` failure surfaces the tool's stderr and leaves
    /// no partial state behind.
    pub fn finalize_and_publish(
        &self,
        title: &str,
        summary: &str,
    ) -> Result<PublishOutcome, GitError> {
        let state = self.create_feature_branch(title)?;
        self.commit_phase(CommitKind::FinalCleanup, title)?;

        let ahead = self.commits_ahead_of_trunk()?;
        if ahead == 0 {
            return Err(GitError::NothingToPublish {
                trunk: self.trunk.clone(),
            });
        }

        run_tool(
            &self.workdir,
            "git",
            &["push", "--set-upstream", "origin", &state.feature_branch],
        )?;
        run_tool(
            &self.workdir,
            "gh",
            &["pr", "create", "--title", title, "--body", summary],
        )?;

        info!(branch = state.feature_branch.as_str(), ahead, "published change request");
        Ok(PublishOutcome {
            branch: state.feature_branch,
            commits_ahead: ahead,
        })
    }

    fn head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
    }

    fn signature(&self) -> Result<Signature<'static>, GitError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Ok(Signature::now("cadence", "cadence@localhost")?),
        }
    }
}

fn detect_trunk(repo: &Repository) -> String {
    for candidate in ["main", "master"] {
        if repo.find_branch(candidate, BranchType::Local).is_ok() {
            return candidate.to_string();
        }
    }
    "main".to_string()
}

fn run_tool(workdir: &Path, tool: &str, args: &[&str]) -> Result<String, GitError> {
    debug!(tool, ?args, "running");
    let output = Command::new(tool)
        .args(args)
        .current_dir(workdir)
        .output()
        .map_err(|e| GitError::ToolFailed {
            tool: tool.to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitError::ToolFailed {
            tool: format!("{} {}", tool, args.first().copied().unwrap_or("")),
            message: stderr.trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "feature".to_string()
    } else {
        slug
    }
}
