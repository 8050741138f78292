//! Resolved run plans handed to the script runtime.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use crate::blueprint::{Blueprint, Mode};
use crate::component::{EntryType, Kind, ObjectCollection};
use crate::error::{ConfigError, ConfigResult, ErrorList};
use crate::resolve::Scope;

/// Every selected service with its resolved entries, phase by phase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub services: Vec<ServicePlan>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePlan {
    pub name: String,
    pub directory: PathBuf,
    pub phases: Vec<PhasePlan>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhasePlan {
    pub phase: EntryType,
    pub entries: Vec<PlannedEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedEntry {
    /// Position in the service's source array.
    pub index: usize,
    pub executor_kind: String,
    pub executor_name: String,
    pub executor_file: PathBuf,
    pub spec: Value,
}

impl Plan {
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn build_plan(
    blueprint: &Blueprint,
    scope: &Scope<'_>,
    phases: &[EntryType],
) -> ConfigResult<Plan> {
    let mut errors = ErrorList::new();
    let mut services = Vec::new();

    for service in blueprint.list_services() {
        let mut service_plan = ServicePlan {
            name: service.name().to_string(),
            directory: service.identity().directory(),
            phases: Vec::new(),
        };

        for phase in phases
            .iter()
            .copied()
            .filter(|p| service.entry_types().contains(p))
        {
            let mut entries = Vec::new();
            for entry in service.entries(phase) {
                let kind: Kind = entry.executor_kind();
                let Some(executor) = blueprint.get_executor(kind, entry.executor_name()) else {
                    errors.push(ConfigError::MissingExecutor {
                        kind,
                        name: entry.executor_name().to_string(),
                        service: service.name().to_string(),
                        origin: service.metadata().clone(),
                    });
                    continue;
                };

                match scope.resolve(service, entry) {
                    Ok(spec) => entries.push(PlannedEntry {
                        index: entry.index(),
                        executor_kind: kind.to_string(),
                        executor_name: executor.name().to_string(),
                        executor_file: executor.metadata().filename().to_path_buf(),
                        spec,
                    }),
                    Err(e) => errors.push(ConfigError::Resolution {
                        service: service.identity().display_name(),
                        phase: phase.to_string(),
                        index: entry.index(),
                        origin: service.metadata().clone(),
                        source: Box::new(e),
                    }),
                }
            }
            service_plan.phases.push(PhasePlan { phase, entries });
        }

        services.push(service_plan);
    }

    errors.finish()?;

    Ok(Plan {
        mode: blueprint.mode(),
        environment: scope.environment().map(|e| e.name().to_string()),
        tag: scope.options().tag().map(str::to_string),
        services,
    })
}
