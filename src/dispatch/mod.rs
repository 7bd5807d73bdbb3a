//! Worker dispatch: render a role's instructions and deliver them to an
//! addressable destination.
//!
//! Workers run fully outside the orchestrator's control; dispatch is
//! fire-and-forget. A delivery failure is logged and reported but mutates no
//! workflow state — the operator simply retries.

mod task;
mod tmux;

pub use task::WorkerTask;
pub use tmux::{Destination, TmuxDestination, check_tmux};

use crate::errors::DispatchError;
use crate::layout::WorkflowLayout;
use std::time::Duration;
use tracing::info;

/// Delay between consecutive deliveries to different destinations.
///
/// This guards against destination-selection races in the multiplexer when
/// several windows receive text back-to-back; workflow correctness never
/// depends on it.
pub const DISPATCH_STAGGER: Duration = Duration::from_millis(300);

pub struct Dispatcher {
    stagger: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            stagger: DISPATCH_STAGGER,
        }
    }
}

impl Dispatcher {
    pub fn new(stagger: Duration) -> Self {
        Self { stagger }
    }

    /// Render and deliver one task.
    pub fn dispatch(
        &self,
        layout: &WorkflowLayout,
        dest: &dyn Destination,
        task: &WorkerTask,
    ) -> Result<(), DispatchError> {
        let instruction = task.render(layout);
        dest.send_text(&instruction)?;
        dest.send_confirm()?;
        info!(
            role = task.role.as_str(),
            target = dest.target(),
            signal = task.completion_signal.as_str(),
            "dispatched worker instructions"
        );
        Ok(())
    }

    /// Deliver a batch to distinct destinations, staggered.
    ///
    /// Stops at the first failure: the operator should see the error before
    /// further windows are touched. Already-delivered instructions stand.
    pub fn dispatch_all(
        &self,
        layout: &WorkflowLayout,
        batch: &[(Box<dyn Destination>, WorkerTask)],
    ) -> Result<(), DispatchError> {
        for (i, (dest, task)) in batch.iter().enumerate() {
            if i > 0 {
                std::thread::sleep(self.stagger);
            }
            self.dispatch(layout, dest.as_ref(), task)?;
        }
        Ok(())
    }
}
