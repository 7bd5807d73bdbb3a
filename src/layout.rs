//! On-disk layout of a cadence session.
//!
//! Everything lives under `.workflow/` in the project root. This layout is an
//! interop contract with externally-running workers and must stay stable:
//!
//! ```text
//! .workflow/
//! ├── state.json        # cached workflow record (signals/ is authoritative)
//! ├── config.json       # session configuration
//! ├── PLAN.md           # plan artifact; first H1 line is the feature name
//! ├── REVIEW.md         # review artifact; STATUS: PASS | STATUS: FAIL
//! ├── contracts/        # shared interface definitions for all workers
//! ├── tasks/<role>.md   # per-role instruction templates
//! ├── signals/<id>.done # empty completion markers
//! ├── archive/          # invalidated review artifacts
//! └── branch.json       # persisted branch state for crash recovery
//! ```

use crate::config::WorkflowConfig;
use crate::errors::WorkflowError;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// The name of the workflow state directory.
pub const WORKFLOW_DIR: &str = ".workflow";

/// Resolved paths for one session's `.workflow/` directory.
#[derive(Debug, Clone)]
pub struct WorkflowLayout {
    root: PathBuf,
}

/// Result of scaffolding a workflow directory.
#[derive(Debug)]
pub struct InitResult {
    /// Path to the `.workflow` directory
    pub workflow_dir: PathBuf,
    /// Whether the directory was newly created (false if it already existed)
    pub created: bool,
}

impl WorkflowLayout {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            root: project_dir.join(WORKFLOW_DIR),
        }
    }

    /// Resolve the layout, failing if the project has not been initialized.
    ///
    /// Every command except `init` goes through this gate; a missing
    /// `.workflow/` directory is a non-zero exit.
    pub fn require(project_dir: &Path) -> Result<Self, WorkflowError> {
        let layout = Self::new(project_dir);
        if !layout.root.is_dir() {
            return Err(WorkflowError::NotInitialized {
                path: layout.root.clone(),
            });
        }
        Ok(layout)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join("state.json")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn plan_file(&self) -> PathBuf {
        self.root.join("PLAN.md")
    }

    pub fn review_file(&self) -> PathBuf {
        self.root.join("REVIEW.md")
    }

    pub fn contracts_dir(&self) -> PathBuf {
        self.root.join("contracts")
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    pub fn task_file(&self, role: &str) -> PathBuf {
        self.tasks_dir().join(format!("{}.md", role))
    }

    pub fn signals_dir(&self) -> PathBuf {
        self.root.join("signals")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }

    pub fn branch_file(&self) -> PathBuf {
        self.root.join("branch.json")
    }

    /// Read the feature name from the plan artifact.
    ///
    /// The first H1 line of `PLAN.md` is the feature name; `None` when the
    /// plan is absent or has no H1.
    pub fn plan_feature_name(&self) -> Option<String> {
        let content = std::fs::read_to_string(self.plan_file()).ok()?;
        content
            .lines()
            .find(|line| line.starts_with("# "))
            .map(|line| line.trim_start_matches("# ").trim().to_string())
            .filter(|name| !name.is_empty())
    }

    /// Check whether a plan artifact exists with content.
    pub fn has_plan(&self) -> bool {
        match std::fs::read_to_string(self.plan_file()) {
            Ok(content) => !content.trim().is_empty(),
            Err(_) => false,
        }
    }

    /// Scaffold the `.workflow/` directory structure.
    ///
    /// Idempotent: an existing directory has its structure completed without
    /// overwriting any file that already exists.
    pub fn scaffold(&self, config: &WorkflowConfig) -> Result<InitResult> {
        let created = !self.root.exists();

        for dir in [
            self.root.clone(),
            self.contracts_dir(),
            self.tasks_dir(),
            self.signals_dir(),
            self.archive_dir(),
        ] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let config_file = self.config_file();
        if !config_file.exists() {
            config.save(&config_file)?;
        }

        for role in &config.workers {
            let task_file = self.task_file(role);
            if !task_file.exists() {
                std::fs::write(&task_file, default_task_template(role)).with_context(|| {
                    format!("Failed to create task template: {}", task_file.display())
                })?;
            }
        }

        let reviewer_file = self.task_file("review");
        if !reviewer_file.exists() {
            std::fs::write(&reviewer_file, default_review_template()).with_context(|| {
                format!(
                    "Failed to create review template: {}",
                    reviewer_file.display()
                )
            })?;
        }

        let compound_file = self.task_file("compound");
        if !compound_file.exists() {
            std::fs::write(&compound_file, default_compound_template()).with_context(|| {
                format!(
                    "Failed to create compound template: {}",
                    compound_file.display()
                )
            })?;
        }

        Ok(InitResult {
            workflow_dir: self.root.clone(),
            created,
        })
    }

    /// Reset the session for a new feature.
    ///
    /// Clears all signals, archives the plan and review artifacts, and
    /// removes the cached state and branch records. Configuration, contracts,
    /// and task templates are kept.
    pub fn reset(&self) -> Result<()> {
        let signals = self.signals_dir();
        if signals.is_dir() {
            for entry in std::fs::read_dir(&signals)
                .with_context(|| format!("Failed to read {}", signals.display()))?
            {
                let path = entry?.path();
                if path.is_file() {
                    std::fs::remove_file(&path)
                        .with_context(|| format!("Failed to remove {}", path.display()))?;
                }
            }
        }

        std::fs::create_dir_all(self.archive_dir())
            .context("Failed to create archive directory")?;
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        for (artifact, label) in [(self.plan_file(), "PLAN"), (self.review_file(), "REVIEW")] {
            if artifact.exists() {
                let dest = self.archive_dir().join(format!("{}.{}.md", label, stamp));
                std::fs::rename(&artifact, &dest)
                    .with_context(|| format!("Failed to archive {}", artifact.display()))?;
            }
        }

        for stale in [self.state_file(), self.branch_file()] {
            if stale.exists() {
                std::fs::remove_file(&stale)
                    .with_context(|| format!("Failed to remove {}", stale.display()))?;
            }
        }

        Ok(())
    }
}

/// Check if a project has a workflow directory.
pub fn is_initialized(project_dir: &Path) -> bool {
    project_dir.join(WORKFLOW_DIR).is_dir()
}

fn default_task_template(role: &str) -> String {
    format!(
        "# {role} task\n\
         \n\
         You are the {{{{role}}}} worker for this feature.\n\
         Work only within: {{{{scope}}}}\n\
         Shared interface definitions live in {{{{contracts_dir}}}}.\n\
         \n\
         <!-- Describe the {role} work for this feature here. -->\n"
    )
}

fn default_compound_template() -> String {
    "# Compound task\n\
     \n\
     The review has passed. Capture what this feature taught us: update\n\
     the contracts in {{contracts_dir}}, record reusable patterns, and note\n\
     anything the next feature should do differently.\n"
        .to_string()
}

fn default_review_template() -> String {
    "# Review task\n\
     \n\
     Review the implementation of this feature against the plan and the\n\
     contracts in {{contracts_dir}}.\n\
     Required checks: {{review_checks}}\n\
     \n\
     Write your findings to .workflow/REVIEW.md. The file MUST contain a\n\
     line reading exactly `STATUS: PASS` or `STATUS: FAIL`, followed by a\n\
     bulleted list of issues when failing.\n"
        .to_string()
}
