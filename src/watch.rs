//! Passive monitoring: re-render on filesystem change, never issue commands.
//!
//! A `notify` watcher on `.workflow/` forwards relevant change events onto a
//! channel; the render loop consumes them in a `select!` alongside a
//! periodic fallback tick (platforms and editors sometimes swallow events)
//! and Ctrl-C. The orchestrator's own cache writes are filtered out so a
//! redraw never triggers itself.

use crate::session::Session;
use crate::ui;
use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Fallback poll period when no change notification arrives.
pub const FALLBACK_POLL: Duration = Duration::from_secs(3);

/// Settle time that batches a burst of marker writes into one redraw.
const DEBOUNCE: Duration = Duration::from_millis(150);

/// Whether a change event should trigger a redraw: signal markers and the
/// two artifacts matter, the orchestrator's own cache files do not.
fn is_relevant(paths: &[PathBuf], signals_dir: &Path) -> bool {
    paths.iter().any(|p| {
        p.starts_with(signals_dir)
            || p.file_name()
                .is_some_and(|name| name == "PLAN.md" || name == "REVIEW.md")
    })
}

pub async fn run_watch(project_dir: &Path) -> Result<()> {
    let session = Session::open(project_dir)?;

    let (tx, mut rx) = mpsc::channel::<()>(64);
    let signals_dir = session.layout.signals_dir();
    let root = session.layout.root().to_path_buf();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let Ok(event) = res else { return };
            if is_relevant(&event.paths, &signals_dir) {
                // A full channel just means a redraw is already queued.
                let _ = tx.try_send(());
            }
        },
        notify::Config::default(),
    )
    .context("Failed to create filesystem watcher")?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .context("Failed to watch workflow directory")?;
    debug!(dir = %root.display(), "watching");

    let bar = ui::watch_spinner();
    let mut tick = tokio::time::interval(FALLBACK_POLL);
    tick.tick().await; // consume the interval's immediate first fire

    loop {
        let snapshot = session.snapshot()?;
        bar.suspend(|| ui::print_status(&snapshot.status_view(&session.config), true));
        bar.set_message(format!(
            "watching {} (Ctrl-C to exit)",
            root.display()
        ));

        tokio::select! {
            _ = rx.recv() => {
                tokio::time::sleep(DEBOUNCE).await;
                while rx.try_recv().is_ok() {}
            }
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                bar.finish_and_clear();
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_changes_are_relevant() {
        let signals = Path::new("/p/.workflow/signals");
        assert!(is_relevant(
            &[PathBuf::from("/p/.workflow/signals/backend.done")],
            signals
        ));
    }

    #[test]
    fn test_artifact_changes_are_relevant() {
        let signals = Path::new("/p/.workflow/signals");
        assert!(is_relevant(&[PathBuf::from("/p/.workflow/REVIEW.md")], signals));
        assert!(is_relevant(&[PathBuf::from("/p/.workflow/PLAN.md")], signals));
    }

    #[test]
    fn test_own_cache_writes_are_filtered() {
        let signals = Path::new("/p/.workflow/signals");
        assert!(!is_relevant(
            &[PathBuf::from("/p/.workflow/state.json")],
            signals
        ));
        assert!(!is_relevant(
            &[PathBuf::from("/p/.workflow/branch.json")],
            signals
        ));
        assert!(!is_relevant(&[], signals));
    }
}
