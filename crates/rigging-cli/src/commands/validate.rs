//! Project validation command.

use anyhow::Result;
use rigging_config::{Blueprint, Mode, Options};
use tracing::info;

use super::Session;

/// Load the project and report every problem found.
///
/// Runs in deploy mode when an environment is given, so environment
/// documents and deploy entries are checked too.
pub fn run(session: &Session, environment: Option<&str>) -> Result<()> {
    let builder = match environment {
        Some(name) => Blueprint::builder(Mode::Deploy).environment(name),
        None => Blueprint::builder(Mode::Build),
    };

    let blueprint = session.load(builder, Options::new())?;
    blueprint.validate()?;

    let services = blueprint.list_services();
    info!(services = services.len(), "configuration is valid");
    println!("Configuration is valid");
    Ok(())
}
