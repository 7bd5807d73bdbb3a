//! The phase state machine.
//!
//! `Phase` is derived, never stored authoritatively: it is recomputed from
//! the signal set plus the review verdict every time it is needed, which
//! keeps the orchestrator correct across crashes and external edits.
//!
//! [`next_phase`] is a pure function of its inputs. The evaluation order is
//! load-bearing: later pipeline stages subsume earlier signals, and a
//! re-submitted refine round must win over a stale FAIL verdict, so the
//! all-refine-signals rule is checked before the verdict rules.

use crate::review::ReviewVerdict;
use crate::signal::{SIG_COMPOUND, SIG_PLAN, SIG_PUBLISH, SIG_REVIEW, refine_signal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The single current stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Init,
    Planning,
    Implementing,
    Reviewing,
    Refining,
    Compounding,
    Complete,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Planning => "planning",
            Phase::Implementing => "implementing",
            Phase::Reviewing => "reviewing",
            Phase::Refining => "refining",
            Phase::Compounding => "compounding",
            Phase::Complete => "complete",
        };
        write!(f, "{}", name)
    }
}

/// Everything `next_phase` looks at. Borrowed, cheap to construct on every
/// recomputation.
#[derive(Debug, Clone, Copy)]
pub struct PhaseView<'a> {
    /// All published completion markers.
    pub signals: &'a BTreeSet<String>,
    /// Verdict from the review artifact; `PENDING` when absent or
    /// unparseable, including when the `review` signal exists but the
    /// artifact does not.
    pub verdict: ReviewVerdict,
    /// Configured worker roles.
    pub workers: &'a [String],
    /// Whether a non-empty plan artifact exists on disk.
    pub plan_artifact_exists: bool,
}

impl PhaseView<'_> {
    fn all_roles_signaled(&self) -> bool {
        !self.workers.is_empty()
            && self
                .workers
                .iter()
                .all(|role| self.signals.contains(role.as_str()))
    }

    fn all_roles_refined(&self) -> bool {
        !self.workers.is_empty()
            && self
                .workers
                .iter()
                .all(|role| self.signals.contains(refine_signal(role).as_str()))
    }
}

/// Compute the current phase. First match wins; see the module docs for why
/// the refine rule precedes the verdict rules.
pub fn next_phase(view: &PhaseView) -> Phase {
    let has_review = view.signals.contains(SIG_REVIEW);

    if view.signals.contains(SIG_COMPOUND) && view.signals.contains(SIG_PUBLISH) {
        Phase::Complete
    } else if has_review && view.verdict == ReviewVerdict::Pass {
        Phase::Compounding
    } else if view.all_roles_refined() {
        Phase::Reviewing
    } else if has_review && view.verdict == ReviewVerdict::Fail {
        Phase::Refining
    } else if view.all_roles_signaled() {
        Phase::Reviewing
    } else if view.signals.contains(SIG_PLAN) {
        Phase::Implementing
    } else if view.plan_artifact_exists {
        Phase::Planning
    } else {
        Phase::Init
    }
}

/// The refine loop has used its whole budget and the review still fails.
/// The only way forward is the operator.
///
/// `iteration` increments on every entry into `refining`, so a value beyond
/// the budget means a review failed *after* the final allowed refine cycle.
pub fn escalation_due(view: &PhaseView, iteration: u32, max_iterations: u32) -> bool {
    next_phase(view) == Phase::Refining && iteration > max_iterations
}

/// Which operator commands currently apply. The controller and the renderer
/// share this one gating computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseOutlook {
    pub phase: Phase,
    pub can_approve_plan: bool,
    pub can_request_review: bool,
    pub can_request_refine: bool,
    pub can_request_compound: bool,
    pub can_publish: bool,
    pub escalated: bool,
}

pub fn outlook(view: &PhaseView, iteration: u32, max_iterations: u32) -> PhaseOutlook {
    let phase = next_phase(view);
    let escalated = escalation_due(view, iteration, max_iterations);
    PhaseOutlook {
        phase,
        can_approve_plan: phase == Phase::Planning,
        can_request_review: phase == Phase::Reviewing,
        can_request_refine: phase == Phase::Refining && !escalated,
        can_request_compound: phase == Phase::Compounding
            && !view.signals.contains(SIG_COMPOUND),
        can_publish: view.signals.contains(SIG_COMPOUND)
            && !view.signals.contains(SIG_PUBLISH),
        escalated,
    }
}
