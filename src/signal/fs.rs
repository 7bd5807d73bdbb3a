//! Filesystem-backed signal bus.
//!
//! Markers are empty `<id>.done` files in the signal directory. Presence is
//! the only datum; content is ignored. Every read is a fresh directory scan
//! so markers written while the orchestrator was not running are observed.

use super::{SignalBus, validate_signal_id};
use crate::errors::WorkflowError;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

const MARKER_EXT: &str = "done";

/// Signal bus backed by marker files in a directory.
#[derive(Debug, Clone)]
pub struct FsSignalBus {
    dir: PathBuf,
}

impl FsSignalBus {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn marker_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, MARKER_EXT))
    }
}

impl SignalBus for FsSignalBus {
    fn publish(&self, id: &str) -> Result<(), WorkflowError> {
        validate_signal_id(id)?;
        std::fs::create_dir_all(&self.dir).map_err(|source| WorkflowError::SignalScanFailed {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.marker_path(id);
        std::fs::write(&path, b"").map_err(|source| WorkflowError::SignalScanFailed {
            path: path.clone(),
            source,
        })?;
        debug!(signal = id, "published marker");
        Ok(())
    }

    fn list_published(&self) -> Result<BTreeSet<String>, WorkflowError> {
        let mut signals = BTreeSet::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            // An absent directory means no signals yet, not a failure.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(signals),
            Err(source) => {
                return Err(WorkflowError::SignalScanFailed {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        for entry in entries {
            let entry = entry.map_err(|source| WorkflowError::SignalScanFailed {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(MARKER_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                signals.insert(stem.to_string());
            }
        }

        Ok(signals)
    }

    fn clear(&self, ids: &[String]) -> Result<(), WorkflowError> {
        for id in ids {
            validate_signal_id(id)?;
            let path = self.marker_path(id);
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(signal = id.as_str(), "cleared marker"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(WorkflowError::SignalScanFailed { path, source });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_bus() -> (FsSignalBus, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        (FsSignalBus::new(dir.path().join("signals")), dir)
    }

    #[test]
    fn test_empty_bus_lists_nothing() {
        let (bus, _dir) = make_bus();
        assert!(bus.list_published().unwrap().is_empty());
    }

    #[test]
    fn test_publish_then_list() {
        let (bus, _dir) = make_bus();
        bus.publish("plan").unwrap();
        bus.publish("backend").unwrap();

        let signals = bus.list_published().unwrap();
        assert_eq!(signals.len(), 2);
        assert!(signals.contains("plan"));
        assert!(signals.contains("backend"));
    }

    #[test]
    fn test_publish_is_idempotent() {
        let (bus, _dir) = make_bus();
        bus.publish("plan").unwrap();
        bus.publish("plan").unwrap();
        assert_eq!(bus.list_published().unwrap().len(), 1);
    }

    #[test]
    fn test_externally_created_marker_is_observed() {
        let (bus, dir) = make_bus();
        bus.publish("plan").unwrap();

        // A worker touches its own marker while we are not looking.
        std::fs::write(dir.path().join("signals/tests.done"), "").unwrap();

        let signals = bus.list_published().unwrap();
        assert!(signals.contains("tests"));
    }

    #[test]
    fn test_non_marker_files_ignored() {
        let (bus, dir) = make_bus();
        bus.publish("plan").unwrap();
        std::fs::write(dir.path().join("signals/notes.txt"), "scratch").unwrap();

        let signals = bus.list_published().unwrap();
        assert_eq!(signals.len(), 1);
        assert!(signals.contains("plan"));
    }

    #[test]
    fn test_clear_removes_only_named_markers() {
        let (bus, _dir) = make_bus();
        for id in ["plan", "review", "backend-refine"] {
            bus.publish(id).unwrap();
        }

        bus.clear(&["review".into(), "backend-refine".into()])
            .unwrap();

        let signals = bus.list_published().unwrap();
        assert_eq!(signals.len(), 1);
        assert!(signals.contains("plan"));
    }

    #[test]
    fn test_clear_missing_marker_is_a_noop() {
        let (bus, _dir) = make_bus();
        bus.clear(&["never-published".into()]).unwrap();
    }

    #[test]
    fn test_publish_rejects_path_escape() {
        let (bus, _dir) = make_bus();
        assert!(bus.publish("../outside").is_err());
    }
}
