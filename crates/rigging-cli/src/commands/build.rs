//! Build plan command.

use std::path::Path;

use anyhow::Result;
use rigging_config::{Blueprint, EntryType, Mode, Options};

use super::{Session, emit_plan};

/// Phases of a build run, in execution order.
pub fn phases(push: bool) -> Vec<EntryType> {
    let mut phases = vec![EntryType::Tag, EntryType::Build];
    if push {
        phases.push(EntryType::Push);
    }
    phases
}

/// Resolve the build plan and emit it as JSON.
pub fn run(session: &Session, push: bool, output: Option<&Path>) -> Result<()> {
    let blueprint = session.load(Blueprint::builder(Mode::Build), Options::new())?;
    blueprint.validate()?;

    let plan = blueprint.plan(&phases(push))?;
    emit_plan(&plan, output)
}
