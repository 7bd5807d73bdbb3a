//! Typed error hierarchy for the cadence orchestrator.
//!
//! Three top-level enums cover the three subsystems:
//! - `WorkflowError` — layout, state, and artifact failures
//! - `DispatchError` — worker instruction delivery failures
//! - `GitError` — branch/commit/publish failures
//!
//! None of these abort the process once a session is running: they are
//! appended to the state record's error log and rendered to the operator.
//! Only unrecoverable filesystem failures at startup abort.

use thiserror::Error;

/// Errors from the workflow layout and state subsystem.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("No .workflow directory at {path}. Run 'cadence init' first")]
    NotInitialized { path: std::path::PathBuf },

    #[error("Failed to scan signal directory {path}: {source}")]
    SignalScanFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid signal id '{id}': must be non-empty and contain no path separators")]
    InvalidSignalId { id: String },

    #[error("Failed to write state file at {path}: {source}")]
    StateWriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Review artifact missing at {path}")]
    ReviewArtifactMissing { path: std::path::PathBuf },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from dispatching instructions to worker destinations.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("tmux binary not found on PATH")]
    TmuxNotFound,

    #[error("Destination '{target}' unreachable: {message}")]
    Unreachable { target: String, message: String },

    #[error("No instruction template for role '{role}' at {path}")]
    TemplateMissing {
        role: String,
        path: std::path::PathBuf,
    },

    #[error("Failed to deliver to '{target}': {source}")]
    DeliveryFailed {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the git lifecycle subsystem.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Not a git repository at {path}")]
    NotARepository { path: std::path::PathBuf },

    #[error("Refusing to publish: no commits ahead of trunk branch '{trunk}'")]
    NothingToPublish { trunk: String },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error(transparent)]
    Internal(#[from] git2::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn workflow_error_not_initialized_carries_path() {
        let err = WorkflowError::NotInitialized {
            path: PathBuf::from("/project/.workflow"),
        };
        assert!(err.to_string().contains("/project/.workflow"));
        assert!(err.to_string().contains("cadence init"));
    }

    #[test]
    fn workflow_error_invalid_signal_id_is_matchable() {
        let err = WorkflowError::InvalidSignalId {
            id: "../escape".to_string(),
        };
        match &err {
            WorkflowError::InvalidSignalId { id } => assert_eq!(id, "../escape"),
            _ => panic!("Expected InvalidSignalId"),
        }
    }

    #[test]
    fn dispatch_error_unreachable_carries_target() {
        let err = DispatchError::Unreachable {
            target: "workflow:backend".to_string(),
            message: "no server running".to_string(),
        };
        assert!(err.to_string().contains("workflow:backend"));
        assert!(err.to_string().contains("no server running"));
    }

    #[test]
    fn git_error_nothing_to_publish_names_trunk() {
        let err = GitError::NothingToPublish {
            trunk: "main".to_string(),
        };
        assert!(err.to_string().contains("main"));
    }

    #[test]
    fn git_error_converts_from_git2() {
        let inner = git2::Error::from_str("bad ref");
        let err: GitError = inner.into();
        assert!(matches!(err, GitError::Internal(_)));
        assert!(err.to_string().contains("bad ref"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&WorkflowError::InvalidSignalId { id: "x".into() });
        assert_std_error(&DispatchError::TmuxNotFound);
        assert_std_error(&GitError::NothingToPublish { trunk: "main".into() });
    }
}
