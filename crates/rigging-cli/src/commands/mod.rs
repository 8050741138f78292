//! CLI command implementations.

pub mod build;
pub mod deploy;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rigging_config::{Blueprint, BlueprintBuilder, Options, Plan};
use tracing::{debug, info};

/// File name looked up when no project file is given.
pub const PROJECT_FILE_NAME: &str = "project.yaml";

/// Flags shared by every command.
#[derive(Debug, Default)]
pub struct Session {
    pub project_file: Option<PathBuf>,
    pub executors: Option<String>,
    pub params: Vec<(String, String)>,
    pub services: Vec<String>,
}

impl Session {
    /// Load the executors and the project, then register the options.
    pub fn load(&self, builder: BlueprintBuilder, options: Options) -> Result<Blueprint> {
        let mut blueprint = builder
            .services(self.services.iter().cloned())
            .build()?;

        if let Some(executors) = &self.executors {
            debug!(%executors, "loading executors");
            blueprint
                .load(executors)
                .with_context(|| format!("Failed to load executors from {executors}"))?;
        }

        let project_file = match &self.project_file {
            Some(path) => path.clone(),
            None => {
                let cwd = std::env::current_dir().context("Failed to read working directory")?;
                find_project_file(&cwd)?
            }
        };
        info!(project = %project_file.display(), mode = %blueprint.mode(), "loading project");

        let pattern = project_file.to_string_lossy();
        blueprint
            .load(&pattern)
            .with_context(|| format!("Failed to load project {pattern}"))?;
        blueprint.add_documents([options.with_params(self.params.iter().cloned())])?;

        Ok(blueprint)
    }
}

/// Search `start` and its ancestors for a project file.
pub fn find_project_file(start: &Path) -> Result<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(PROJECT_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    bail!(
        "No {} found in {} or any parent directory",
        PROJECT_FILE_NAME,
        start.display()
    )
}

/// Parse a `KEY=VALUE` pair. The value may itself contain `=`.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid parameter \"{raw}\", expected KEY=VALUE")),
    }
}

/// Print the plan to stdout or write it to `output`.
pub fn emit_plan(plan: &Plan, output: Option<&Path>) -> Result<()> {
    let json = plan.to_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .with_context(|| format!("Failed to write plan to {}", path.display()))?;
            info!(path = %path.display(), services = plan.services.len(), "plan written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
