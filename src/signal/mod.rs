//! Completion signaling between the orchestrator and external workers.
//!
//! A signal is a durable, idempotent marker meaning "this unit of work is
//! complete". Workers only ever create their own marker; the orchestrator
//! clears markers only when starting a refine iteration or resetting. Phase
//! computation checks set membership, never arrival order, so out-of-order
//! marker creation is harmless.
//!
//! The [`SignalBus`] trait decouples the state machine from the storage
//! substrate: production uses [`FsSignalBus`] (`signals/<id>.done` marker
//! files), tests use [`MemorySignalBus`].

mod fs;
mod memory;

pub use fs::FsSignalBus;
pub use memory::MemorySignalBus;

use crate::errors::WorkflowError;
use std::collections::BTreeSet;

/// The plan-approved signal.
pub const SIG_PLAN: &str = "plan";
/// The review-complete signal.
pub const SIG_REVIEW: &str = "review";
/// The learnings-captured signal.
pub const SIG_COMPOUND: &str = "compound";
/// The change-request-opened signal.
pub const SIG_PUBLISH: &str = "publish";

/// The refine-scope signal id for a worker role.
pub fn refine_signal(role: &str) -> String {
    format!("{}-refine", role)
}

/// Reject ids that would escape the signal directory or produce an
/// unaddressable marker file.
pub fn validate_signal_id(id: &str) -> Result<(), WorkflowError> {
    if id.is_empty() || id.contains('/') || id.contains('\\') || id == "." || id == ".." {
        return Err(WorkflowError::InvalidSignalId { id: id.to_string() });
    }
    Ok(())
}

/// Append-only completion-marker store; the sole IPC primitive.
pub trait SignalBus {
    /// Create a durable marker for `id`. Idempotent.
    fn publish(&self, id: &str) -> Result<(), WorkflowError>;

    /// Enumerate all published markers with a fresh read; no in-memory cache
    /// is trusted across calls, so externally-created markers are always
    /// observed.
    fn list_published(&self) -> Result<BTreeSet<String>, WorkflowError>;

    /// Remove specific markers. Used only when starting a refine iteration
    /// or resetting the session.
    fn clear(&self, ids: &[String]) -> Result<(), WorkflowError>;
}
