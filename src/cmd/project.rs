//! Project initialization and reset commands.

use anyhow::Result;
use std::path::Path;

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    use cadence::config::WorkflowConfig;
    use cadence::layout::{WorkflowLayout, is_initialized};

    let was_initialized = is_initialized(project_dir);

    let layout = WorkflowLayout::new(project_dir);
    let config = WorkflowConfig::load_or_default(&layout.config_file())?;
    let result = layout.scaffold(&config)?;

    if result.created {
        println!(
            "Initialized workflow at {}",
            result.workflow_dir.display()
        );
        println!();
        println!("Created directory structure:");
        println!("  .workflow/");
        println!("  ├── config.json    # session configuration");
        println!("  ├── contracts/     # shared interface definitions");
        println!("  ├── tasks/         # per-role instruction templates");
        println!("  ├── signals/       # completion markers");
        println!("  └── archive/       # invalidated review artifacts");
        println!();
        println!("Next steps:");
        println!("  1. Have the planner write .workflow/PLAN.md");
        println!("  2. Run `cadence` to drive the pipeline interactively");
        println!("  3. Run `cadence watch` in another pane to monitor");
    } else if was_initialized {
        println!(
            "Workflow already initialized at {}",
            result.workflow_dir.display()
        );
        println!("Directory structure verified.");
    } else {
        println!(
            "Completed workflow initialization at {}",
            result.workflow_dir.display()
        );
    }

    Ok(())
}

pub fn cmd_reset(project_dir: &Path, assume_yes: bool, force: bool) -> Result<()> {
    use cadence::layout::WorkflowLayout;
    use dialoguer::Confirm;

    let layout = WorkflowLayout::require(project_dir)?;

    if !force && !assume_yes {
        let confirm = Confirm::new()
            .with_prompt("This clears all signals and archives the plan and review. Are you sure?")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    layout.reset()?;
    println!("Reset complete; configuration and task templates kept");
    Ok(())
}
