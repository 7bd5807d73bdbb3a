//! In-memory signal bus for tests.

use super::{SignalBus, validate_signal_id};
use crate::errors::WorkflowError;
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Signal bus backed by an in-process set. Same contract as the filesystem
/// bus, minus durability.
#[derive(Debug, Default)]
pub struct MemorySignalBus {
    signals: Mutex<BTreeSet<String>>,
}

impl MemorySignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the bus with a set of signals.
    pub fn with_signals<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let bus = Self::new();
        {
            let mut signals = bus.signals.lock().expect("signal set lock");
            signals.extend(ids.into_iter().map(Into::into));
        }
        bus
    }
}

impl SignalBus for MemorySignalBus {
    fn publish(&self, id: &str) -> Result<(), WorkflowError> {
        validate_signal_id(id)?;
        self.signals
            .lock()
            .expect("signal set lock")
            .insert(id.to_string());
        Ok(())
    }

    fn list_published(&self) -> Result<BTreeSet<String>, WorkflowError> {
        Ok(self.signals.lock().expect("signal set lock").clone())
    }

    fn clear(&self, ids: &[String]) -> Result<(), WorkflowError> {
        let mut signals = self.signals.lock().expect("signal set lock");
        for id in ids {
            validate_signal_id(id)?;
            signals.remove(id);
        }
        Ok(())
    }
}
