//! Terminal rendering for status, watch, and the interactive controller.
//!
//! All rendering funnels through [`render_status`], which builds the styled
//! block as a string so the watch loop can redraw it and tests can assert on
//! it. Styling via `console`; the watch loop's liveness spinner via
//! `indicatif`.

use crate::git::BranchState;
use crate::machine::{Phase, PhaseOutlook};
use crate::review::ReviewVerdict;
use crate::signal::{SIG_COMPOUND, SIG_PLAN, SIG_PUBLISH, SIG_REVIEW, refine_signal};
use crate::state::WorkflowRecord;
use console::{Emoji, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static HOURGLASS: Emoji<'_, '_> = Emoji("⏳ ", "[..]");
pub static SIREN: Emoji<'_, '_> = Emoji("🚨 ", "[!!]");

/// Everything the renderer needs for one frame.
pub struct StatusView<'a> {
    pub record: &'a WorkflowRecord,
    pub verdict: ReviewVerdict,
    pub outlook: PhaseOutlook,
    pub workers: &'a [String],
    pub max_iterations: u32,
    pub feature: Option<String>,
    pub branch: Option<BranchState>,
    pub escalation_issues: Vec<String>,
}

const PIPELINE: [Phase; 7] = [
    Phase::Init,
    Phase::Planning,
    Phase::Implementing,
    Phase::Reviewing,
    Phase::Refining,
    Phase::Compounding,
    Phase::Complete,
];

/// Build the full status block.
pub fn render_status(view: &StatusView) -> String {
    let mut out = String::new();
    let sep = format!("{}\n", style("═".repeat(62)).cyan());

    out.push_str(&sep);
    match &view.feature {
        Some(name) => out.push_str(&format!(
            "{} {}\n",
            style("Feature:").bold(),
            style(name).yellow()
        )),
        None => out.push_str(&format!(
            "{} {}\n",
            style("Feature:").bold(),
            style("(no plan yet)").dim()
        )),
    }
    out.push_str(&format!(
        "{} {}\n",
        style("Phase:  ").bold(),
        style(view.outlook.phase).green().bold()
    ));
    if let Some(branch) = &view.branch {
        out.push_str(&format!(
            "{} {} {}\n",
            style("Branch: ").bold(),
            style(&branch.feature_branch).yellow(),
            style(format!("(from {})", branch.previous_branch)).dim()
        ));
    }
    out.push_str(&format!(
        "{} {}/{}   {} {}\n",
        style("Refine: ").bold(),
        view.record.iteration,
        view.max_iterations,
        style("Verdict:").bold(),
        match view.verdict {
            ReviewVerdict::Pass => style("PASS").green(),
            ReviewVerdict::Fail => style("FAIL").red(),
            ReviewVerdict::Pending => style("PENDING").dim(),
        }
    ));
    out.push_str(&sep);

    out.push_str(&format!("{}\n", style("Pipeline").underlined()));
    let marks: Vec<String> = PIPELINE
        .iter()
        .map(|p| {
            if *p == view.outlook.phase {
                format!("{}", style(p).green().bold())
            } else {
                format!("{}", style(p).dim())
            }
        })
        .collect();
    out.push_str(&format!("  {}\n\n", marks.join(" › ")));

    out.push_str(&format!("{}\n", style("Signals").underlined()));
    out.push_str(&signal_line(view, SIG_PLAN, "plan approved"));
    for role in view.workers {
        out.push_str(&signal_line(view, role, "implementation"));
    }
    out.push_str(&signal_line(view, SIG_REVIEW, "review complete"));
    if view.record.iteration > 0 {
        for role in view.workers {
            let id = refine_signal(role);
            out.push_str(&signal_line(view, &id, "refine round"));
        }
    }
    out.push_str(&signal_line(view, SIG_COMPOUND, "learnings captured"));
    out.push_str(&signal_line(view, SIG_PUBLISH, "change request opened"));

    if !view.record.errors.is_empty() {
        out.push('\n');
        out.push_str(&format!("{}\n", style("Errors").underlined().red()));
        for error in view.record.errors.iter().rev().take(5) {
            out.push_str(&format!("  {} {}\n", CROSS, style(error).red()));
        }
    }

    if view.outlook.escalated {
        out.push('\n');
        out.push_str(&format!(
            "{}{}\n",
            SIREN,
            style(format!(
                "Refine budget of {} iterations exhausted and the review still fails.",
                view.max_iterations
            ))
            .red()
            .bold()
        ));
        out.push_str(&format!(
            "   {}\n",
            style("Resolve the remaining issues manually, or force the verdict:").red()
        ));
        for issue in &view.escalation_issues {
            out.push_str(&format!("   {} {}\n", style("•").red(), issue));
        }
    }

    out
}

fn signal_line(view: &StatusView, id: &str, label: &str) -> String {
    let mark = if view.record.signals.contains(id) {
        format!("{}", CHECK)
    } else {
        format!("{}", HOURGLASS)
    };
    format!("  {}{:<18} {}\n", mark, id, style(label).dim())
}

/// Print one frame, preceded by a screen clear when redrawing in place.
pub fn print_status(view: &StatusView, clear_first: bool) {
    let term = console::Term::stdout();
    if clear_first {
        let _ = term.clear_screen();
    }
    println!("{}", render_status(view));
}

/// Liveness spinner for the watch loop's idle periods.
pub fn watch_spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .expect("spinner template is a valid static string"),
    );
    bar.set_message("watching for signal changes (Ctrl-C to exit)");
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
