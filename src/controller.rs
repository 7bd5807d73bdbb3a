//! The interactive controller: render state, accept one operator command,
//! apply its side effects, repeat.
//!
//! Command gating comes from the shared [`PhaseOutlook`] so the menu can
//! only offer transitions the state machine would accept. Side effects are
//! ordered so that a failure leaves the command available for retry: workers
//! are dispatched before the signal that marks the transition is published.

use crate::dispatch::{Destination, Dispatcher, TmuxDestination, WorkerTask};
use crate::git::{CommitKind, GitLifecycle};
use crate::machine::PhaseOutlook;
use crate::review::ReviewVerdict;
use crate::session::Session;
use crate::signal::{SIG_COMPOUND, SIG_PLAN, SIG_PUBLISH, SIG_REVIEW, SignalBus, refine_signal};
use crate::state::WorkflowRecord;
use crate::ui;
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Select, theme::ColorfulTheme};
use tracing::info;

/// Operator commands. Each maps 1:1 onto a set of side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ApprovePlan,
    RequestReview,
    RequestRefine,
    RequestCompound,
    Publish,
    ForcePass,
    Checkpoint,
    Refresh,
    Reset,
    Quit,
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Command::ApprovePlan => "Approve plan (branch, commit, dispatch implementers)",
            Command::RequestReview => "Request review (archive old review, dispatch reviewer)",
            Command::RequestRefine => "Request refine round (dispatch refiners)",
            Command::RequestCompound => "Capture learnings (dispatch compound worker)",
            Command::Publish => "Publish (push + open change request)",
            Command::ForcePass => "Force review verdict to PASS (override)",
            Command::Checkpoint => "Checkpoint commit",
            Command::Refresh => "Refresh",
            Command::Reset => "Reset for a new feature (destructive)",
            Command::Quit => "Quit",
        }
    }
}

/// The commands the operator may issue right now.
pub fn available_commands(outlook: &PhaseOutlook, verdict: ReviewVerdict) -> Vec<Command> {
    let mut commands = Vec::new();
    if outlook.can_approve_plan {
        commands.push(Command::ApprovePlan);
    }
    if outlook.can_request_review {
        commands.push(Command::RequestReview);
    }
    if outlook.can_request_refine {
        commands.push(Command::RequestRefine);
    }
    if outlook.can_request_compound {
        commands.push(Command::RequestCompound);
    }
    if outlook.can_publish {
        commands.push(Command::Publish);
    }
    if verdict == ReviewVerdict::Fail {
        commands.push(Command::ForcePass);
    }
    commands.extend([
        Command::Checkpoint,
        Command::Refresh,
        Command::Reset,
        Command::Quit,
    ]);
    commands
}

/// Change-request body generated at publish time.
pub fn publish_summary(record: &WorkflowRecord, workers: &[String], feature: &str) -> String {
    let mut out = format!("Automated pipeline run for \"{}\".\n\nPhases completed:\n", feature);
    if record.signals.contains(SIG_PLAN) {
        out.push_str("- plan approved\n");
    }
    let done: Vec<&str> = workers
        .iter()
        .filter(|role| record.signals.contains(role.as_str()))
        .map(|role| role.as_str())
        .collect();
    if !done.is_empty() {
        out.push_str(&format!("- implementation ({})\n", done.join(", ")));
    }
    if record.signals.contains(SIG_REVIEW) {
        match record.iteration {
            0 => out.push_str("- review passed\n"),
            n => out.push_str(&format!(
                "- review passed after {} refine iteration{}\n",
                n,
                if n == 1 { "" } else { "s" }
            )),
        }
    }
    if record.signals.contains(SIG_COMPOUND) {
        out.push_str("- learnings captured\n");
    }
    out
}

pub struct Controller {
    session: Session,
    dispatcher: Dispatcher,
    assume_yes: bool,
}

impl Controller {
    pub fn new(session: Session, assume_yes: bool) -> Self {
        Self {
            session,
            dispatcher: Dispatcher::default(),
            assume_yes,
        }
    }

    /// The idle → awaiting-input → applying-command → idle loop.
    pub fn run(&self) -> Result<()> {
        loop {
            let snapshot = self.session.snapshot()?;
            ui::print_status(&snapshot.status_view(&self.session.config), true);

            let commands = available_commands(&snapshot.outlook, snapshot.verdict);
            let labels: Vec<&str> = commands.iter().map(|c| c.label()).collect();
            let selection = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Command")
                .items(&labels)
                .default(0)
                .interact()
                .context("Operator input unavailable")?;

            let command = commands[selection];
            if command == Command::Quit {
                return Ok(());
            }

            if let Err(e) = self.apply(command) {
                // Surface and remember, never crash the loop; the command
                // stays available for retry.
                let message = format!("{} failed: {:#}", command.label(), e);
                eprintln!("{}", style(&message).red());
                self.session.store.record_error(message)?;
            }
        }
    }

    /// Apply one command's side effects.
    pub fn apply(&self, command: Command) -> Result<()> {
        match command {
            Command::ApprovePlan => self.approve_plan(),
            Command::RequestReview => self.request_review(),
            Command::RequestRefine => self.request_refine(),
            Command::RequestCompound => self.request_compound(),
            Command::Publish => self.publish(),
            Command::ForcePass => self.force_pass(),
            Command::Checkpoint => self.checkpoint(),
            Command::Refresh => Ok(()),
            Command::Reset => self.reset(),
            Command::Quit => Ok(()),
        }
    }

    fn git(&self) -> Result<GitLifecycle> {
        Ok(GitLifecycle::new(
            self.session.project_dir(),
            self.session.config.trunk_branch.as_deref(),
        )?)
    }

    fn feature_name(&self) -> String {
        self.session
            .layout
            .plan_feature_name()
            .unwrap_or_else(|| "feature".to_string())
    }

    fn implementer_batch(
        &self,
        signal_for: impl Fn(&str) -> String,
    ) -> Result<Vec<(Box<dyn Destination>, WorkerTask)>> {
        let mut batch: Vec<(Box<dyn Destination>, WorkerTask)> = Vec::new();
        for role in &self.session.config.workers {
            let task = WorkerTask::from_template(
                &self.session.layout,
                &self.session.config,
                role,
                &signal_for(role),
            )?;
            let dest = TmuxDestination::new(self.session.config.destination(role));
            batch.push((Box::new(dest), task));
        }
        Ok(batch)
    }

    fn approve_plan(&self) -> Result<()> {
        let feature = self.feature_name();

        let git = self.git()?;
        let branch = git.create_feature_branch(&feature)?;
        branch.save(&self.session.layout.branch_file())?;
        git.commit_phase(CommitKind::PlanAccepted, &feature)?;

        let batch = self.implementer_batch(|role| role.to_string())?;
        self.dispatcher.dispatch_all(&self.session.layout, &batch)?;

        self.session.publish_signal(SIG_PLAN)?;
        info!(feature = feature.as_str(), "plan approved; implementers dispatched");
        Ok(())
    }

    fn request_review(&self) -> Result<()> {
        let snapshot = self.session.snapshot()?;

        let kind = if snapshot.record.iteration == 0 {
            CommitKind::ImplementationComplete
        } else {
            CommitKind::RefinementComplete
        };
        self.git()?.commit_phase(kind, &self.feature_name())?;

        // Invalidate the previous round before the re-review: archive the
        // artifact, drop its marker, and retire the refine markers so a new
        // FAIL verdict cannot be shadowed by a finished round.
        let artifact = self.session.review_artifact();
        artifact.archive(snapshot.record.iteration)?;
        let mut stale: Vec<String> = vec![SIG_REVIEW.to_string()];
        stale.extend(self.session.config.workers.iter().map(|r| refine_signal(r)));
        self.session.bus.clear(&stale)?;

        let task = WorkerTask::from_template(
            &self.session.layout,
            &self.session.config,
            "review",
            SIG_REVIEW,
        )?;
        let dest = TmuxDestination::new(self.session.config.destination("review"));
        self.dispatcher.dispatch(&self.session.layout, &dest, &task)?;
        info!("reviewer dispatched");
        Ok(())
    }

    fn request_refine(&self) -> Result<()> {
        // The iteration itself was counted when the failing verdict moved
        // the phase into refining; this command only clears the previous
        // round's markers and dispatches the fixes.
        let refine_ids: Vec<String> = self
            .session
            .config
            .workers
            .iter()
            .map(|role| refine_signal(role))
            .collect();
        self.session.bus.clear(&refine_ids)?;

        let batch = self.implementer_batch(|role| refine_signal(role))?;
        self.dispatcher.dispatch_all(&self.session.layout, &batch)?;

        let iteration = self.session.snapshot()?.record.iteration;
        info!(iteration, "refine round dispatched");
        Ok(())
    }

    fn request_compound(&self) -> Result<()> {
        let task = WorkerTask::from_template(
            &self.session.layout,
            &self.session.config,
            "compound",
            SIG_COMPOUND,
        )?;
        let dest = TmuxDestination::new(self.session.config.destination("compound"));
        self.dispatcher.dispatch(&self.session.layout, &dest, &task)?;
        info!("compound worker dispatched");
        Ok(())
    }

    fn publish(&self) -> Result<()> {
        let snapshot = self.session.snapshot()?;
        let feature = self.feature_name();
        let summary = publish_summary(&snapshot.record, &self.session.config.workers, &feature);

        let outcome = self.git()?.finalize_and_publish(&feature, &summary)?;
        self.session.publish_signal(SIG_PUBLISH)?;
        println!(
            "{} Published {} ({} commit{} ahead of trunk)",
            ui::CHECK,
            style(&outcome.branch).green(),
            outcome.commits_ahead,
            if outcome.commits_ahead == 1 { "" } else { "s" }
        );
        Ok(())
    }

    fn force_pass(&self) -> Result<()> {
        let rewritten = self.session.review_artifact().force_pass()?;
        println!(
            "{} Rewrote {} FAIL token{} to PASS (forced)",
            ui::CHECK,
            rewritten,
            if rewritten == 1 { "" } else { "s" }
        );
        Ok(())
    }

    fn checkpoint(&self) -> Result<()> {
        match self.git()?.commit_phase(CommitKind::Checkpoint, &self.feature_name())? {
            Some(sha) => println!("{} Checkpoint commit {}", ui::CHECK, &sha[..8]),
            None => println!("Nothing to commit"),
        }
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        if !self.assume_yes {
            let confirmed = Confirm::new()
                .with_prompt("This clears all signals and archives the plan and review. Continue?")
                .default(false)
                .interact()
                .unwrap_or(false);
            if !confirmed {
                println!("Reset cancelled");
                return Ok(());
            }
        }
        self.session.layout.reset()?;
        println!("{} Workflow reset; ready for a new feature", ui::CHECK);
        Ok(())
    }
}
