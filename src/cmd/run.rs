//! Bare invocation: the interactive controller.

use anyhow::Result;
use std::path::Path;

pub fn run_controller(project_dir: &Path, assume_yes: bool) -> Result<()> {
    use cadence::controller::Controller;
    use cadence::session::Session;

    let session = Session::open(project_dir)?;
    Controller::new(session, assume_yes).run()
}
