//! An open workflow session: layout, configuration, signal bus, and state
//! store bound together, plus the one snapshot computation every front end
//! (status, watch, interactive) shares.

use crate::config::WorkflowConfig;
use crate::errors::WorkflowError;
use crate::git::BranchState;
use crate::layout::WorkflowLayout;
use crate::machine::{PhaseOutlook, PhaseView, outlook};
use crate::review::{ReviewArtifact, ReviewVerdict};
use crate::signal::{FsSignalBus, SignalBus};
use crate::state::{StateStore, WorkflowRecord};
use crate::ui::StatusView;
use anyhow::Result;
use std::path::{Path, PathBuf};

pub struct Session {
    pub layout: WorkflowLayout,
    pub config: WorkflowConfig,
    pub bus: FsSignalBus,
    pub store: StateStore,
    project_dir: PathBuf,
}

/// One consistent read of the whole workflow state.
pub struct Snapshot {
    pub record: WorkflowRecord,
    pub verdict: ReviewVerdict,
    pub outlook: PhaseOutlook,
    pub feature: Option<String>,
    /// Branch bookkeeping from a previous (possibly crashed) run.
    pub branch: Option<BranchState>,
    pub escalation_issues: Vec<String>,
}

impl Session {
    /// Open a session in an initialized project.
    pub fn open(project_dir: &Path) -> Result<Self, WorkflowError> {
        let layout = WorkflowLayout::require(project_dir)?;
        let config = WorkflowConfig::load_or_default(&layout.config_file())?;
        let bus = FsSignalBus::new(layout.signals_dir());
        let store = StateStore::new(layout.state_file());
        Ok(Self {
            layout,
            config,
            bus,
            store,
            project_dir: project_dir.to_path_buf(),
        })
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn review_artifact(&self) -> ReviewArtifact {
        ReviewArtifact::new(self.layout.review_file(), self.layout.archive_dir())
    }

    /// Rebuild the record from the signal directory and derive the phase,
    /// verdict, and command gating for this instant.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let artifact = self.review_artifact();
        // A review signal whose artifact is gone parses as PENDING; the
        // verdict is never trusted by omission.
        let verdict = artifact.verdict();
        let plan_exists = self.layout.has_plan();

        let record = self
            .store
            .rebuild(&self.bus, verdict, &self.config, plan_exists)?;

        let o = outlook(
            &PhaseView {
                signals: &record.signals,
                verdict,
                workers: &self.config.workers,
                plan_artifact_exists: plan_exists,
            },
            record.iteration,
            self.config.max_iterations,
        );

        let escalation_issues = if o.escalated {
            artifact.unresolved_issues()
        } else {
            Vec::new()
        };

        Ok(Snapshot {
            record,
            verdict,
            outlook: o,
            feature: self.layout.plan_feature_name(),
            branch: BranchState::load(&self.layout.branch_file()),
            escalation_issues,
        })
    }

    /// Convenience for publishing an orchestrator-owned signal.
    pub fn publish_signal(&self, id: &str) -> Result<(), WorkflowError> {
        self.bus.publish(id)
    }
}

impl Snapshot {
    pub fn status_view<'a>(&'a self, config: &'a WorkflowConfig) -> StatusView<'a> {
        StatusView {
            record: &self.record,
            verdict: self.verdict,
            outlook: self.outlook,
            workers: &config.workers,
            max_iterations: config.max_iterations,
            feature: self.feature.clone(),
            branch: self.branch.clone(),
            escalation_issues: self.escalation_issues.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Phase;
    use tempfile::tempdir;

    fn open_session(dir: &Path) -> Session {
        let layout = WorkflowLayout::new(dir);
        layout.scaffold(&WorkflowConfig::default()).unwrap();
        Session::open(dir).unwrap()
    }

    #[test]
    fn test_open_requires_initialization() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Session::open(dir.path()),
            Err(WorkflowError::NotInitialized { .. })
        ));
    }

    #[test]
    fn test_snapshot_fresh_session_is_init() {
        let dir = tempdir().unwrap();
        let session = open_session(dir.path());

        let snap = session.snapshot().unwrap();
        assert_eq!(snap.outlook.phase, Phase::Init);
        assert_eq!(snap.verdict, ReviewVerdict::Pending);
        assert!(snap.feature.is_none());
    }

    #[test]
    fn test_snapshot_sees_worker_markers() {
        let dir = tempdir().unwrap();
        let session = open_session(dir.path());

        std::fs::write(session.layout.plan_file(), "# Checkout Flow\n").unwrap();
        session.publish_signal("plan").unwrap();
        for role in ["backend", "frontend", "tests"] {
            std::fs::write(
                session.layout.signals_dir().join(format!("{}.done", role)),
                "",
            )
            .unwrap();
        }

        let snap = session.snapshot().unwrap();
        assert_eq!(snap.outlook.phase, Phase::Reviewing);
        assert_eq!(snap.feature.as_deref(), Some("Checkout Flow"));
        assert!(snap.outlook.can_request_review);
    }

    #[test]
    fn test_snapshot_review_signal_without_artifact_is_pending() {
        let dir = tempdir().unwrap();
        let session = open_session(dir.path());

        std::fs::write(session.layout.plan_file(), "# F\n").unwrap();
        for id in ["plan", "backend", "frontend", "tests", "review"] {
            session.publish_signal(id).unwrap();
        }

        let snap = session.snapshot().unwrap();
        assert_eq!(snap.verdict, ReviewVerdict::Pending);
        assert_eq!(snap.outlook.phase, Phase::Reviewing);
    }

    #[test]
    fn test_snapshot_recovers_persisted_branch_state() {
        let dir = tempdir().unwrap();
        let session = open_session(dir.path());

        BranchState {
            feature_branch: "feature/x".into(),
            previous_branch: "main".into(),
        }
        .save(&session.layout.branch_file())
        .unwrap();

        // A fresh session (as after a crash) still sees the branch record.
        let session = Session::open(dir.path()).unwrap();
        let snap = session.snapshot().unwrap();
        assert_eq!(
            snap.branch.map(|b| b.feature_branch).as_deref(),
            Some("feature/x")
        );
    }

    #[test]
    fn test_snapshot_escalation_carries_issues() {
        let dir = tempdir().unwrap();
        let session = open_session(dir.path());

        std::fs::write(session.layout.plan_file(), "# F\n").unwrap();
        for id in ["plan", "backend", "frontend", "tests", "review"] {
            session.publish_signal(id).unwrap();
        }
        std::fs::write(
            session.layout.review_file(),
            "STATUS: FAIL\n- flaky retry logic\n",
        )
        .unwrap();

        // Push the iteration count past the budget.
        let mut record = session.snapshot().unwrap().record;
        record.iteration = session.config.max_iterations + 1;
        session.store.save(&record).unwrap();

        let snap = session.snapshot().unwrap();
        assert!(snap.outlook.escalated);
        assert_eq!(snap.escalation_issues, vec!["flaky retry logic"]);
    }
}
