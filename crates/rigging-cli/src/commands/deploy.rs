//! Deploy plan command.

use std::path::Path;

use anyhow::Result;
use rigging_config::{Blueprint, EntryType, Mode, Options};

use super::{Session, emit_plan};

/// Resolve the deploy plan for `environment` and emit it as JSON.
pub fn run(
    session: &Session,
    environment: &str,
    tag: Option<String>,
    output: Option<&Path>,
) -> Result<()> {
    let mut options = Options::new();
    if let Some(tag) = tag {
        options = options.with_tag(tag);
    }

    let blueprint = session.load(
        Blueprint::builder(Mode::Deploy).environment(environment),
        options,
    )?;
    blueprint.validate()?;

    let plan = blueprint.plan(&[EntryType::Deploy])?;
    emit_plan(&plan, output)
}
