//! Durable workflow record, cached as `.workflow/state.json`.
//!
//! The cache exists for external introspection and crash recovery of the
//! fields that cannot be derived (iteration count, session start, error
//! log). Everything derivable — the phase and the signal set — is rebuilt
//! from the signal bus on every read; a corrupt or stale cache is ignored,
//! never trusted over recomputation.

use crate::config::WorkflowConfig;
use crate::errors::WorkflowError;
use crate::machine::{Phase, PhaseView, next_phase};
use crate::review::ReviewVerdict;
use crate::signal::SignalBus;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

/// One session's workflow record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRecord {
    pub phase: Phase,
    /// Count of refine cycles started so far.
    pub iteration: u32,
    pub started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub signals: BTreeSet<String>,
    /// Operator-visible error log; errors accumulate here instead of
    /// aborting the process.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl WorkflowRecord {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            phase: Phase::Init,
            iteration: 0,
            started_at: now,
            last_updated: now,
            signals: BTreeSet::new(),
            errors: Vec::new(),
        }
    }
}

/// Reader/writer for the state cache.
pub struct StateStore {
    state_file: PathBuf,
}

impl StateStore {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    /// Load the cached record. `None` when the file is absent or corrupt —
    /// the cache is disposable, so a parse failure is not an error.
    pub fn load_cached(&self) -> Option<WorkflowRecord> {
        let content = std::fs::read_to_string(&self.state_file).ok()?;
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(
                    path = %self.state_file.display(),
                    error = %e,
                    "ignoring corrupt state cache"
                );
                None
            }
        }
    }

    /// Rebuild the record from the authoritative inputs and persist it.
    ///
    /// Signals come from a fresh bus scan; the phase is recomputed from
    /// them; iteration, session start, and the error log are carried over
    /// from the cache when it is readable.
    pub fn rebuild(
        &self,
        bus: &dyn SignalBus,
        verdict: ReviewVerdict,
        config: &WorkflowConfig,
        plan_artifact_exists: bool,
    ) -> Result<WorkflowRecord> {
        let signals = bus.list_published()?;
        let now = Utc::now();

        let mut record = self.load_cached().unwrap_or_else(|| WorkflowRecord::fresh(now));
        let prior_phase = record.phase;
        record.phase = next_phase(&PhaseView {
            signals: &signals,
            verdict,
            workers: &config.workers,
            plan_artifact_exists,
        });
        // Each entry into refining is one refine cycle; the edge is counted
        // here so the count survives regardless of which front end observed
        // the failing verdict first.
        if record.phase == Phase::Refining && prior_phase != Phase::Refining {
            record.iteration += 1;
        }
        record.signals = signals;
        record.last_updated = now;

        self.save(&record)?;
        Ok(record)
    }

    /// Persist the record as pretty JSON.
    pub fn save(&self, record: &WorkflowRecord) -> Result<()> {
        let content = serde_json::to_string_pretty(record)
            .context("Failed to serialize workflow record")?;
        std::fs::write(&self.state_file, content).map_err(|source| {
            WorkflowError::StateWriteFailed {
                path: self.state_file.clone(),
                source,
            }
        })?;
        Ok(())
    }

    /// Append to the visible error log and persist.
    pub fn record_error(&self, message: impl Into<String>) -> Result<()> {
        let now = Utc::now();
        let mut record = self.load_cached().unwrap_or_else(|| WorkflowRecord::fresh(now));
        let message = message.into();
        tracing::warn!(error = message.as_str(), "recording workflow error");
        record
            .errors
            .push(format!("{} {}", now.format("%Y-%m-%dT%H:%M:%SZ"), message));
        record.last_updated = now;
        self.save(&record)
    }
}
