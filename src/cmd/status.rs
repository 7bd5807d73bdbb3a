//! One-shot status and continuous watch commands.

use anyhow::Result;
use std::path::Path;

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    use cadence::session::Session;
    use cadence::ui;

    let session = Session::open(project_dir)?;
    let snapshot = session.snapshot()?;
    ui::print_status(&snapshot.status_view(&session.config), false);
    Ok(())
}

pub async fn cmd_watch(project_dir: &Path) -> Result<()> {
    cadence::watch::run_watch(project_dir).await
}
