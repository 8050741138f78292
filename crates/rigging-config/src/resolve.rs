//! Entry spec resolution.

use serde_json::Value;
use tracing::debug;

use crate::component::{Entry, Environment, Kind, Options, Project, Service};
use crate::error::{ConfigError, ConfigResult};
use crate::placeholders::{Values, merge_values, replace_with_values};

/// The run singletons every entry spec is resolved against.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    project: &'a Project,
    options: &'a Options,
    environment: Option<&'a Environment>,
}

impl<'a> Scope<'a> {
    pub fn new(project: &'a Project, options: &'a Options) -> Self {
        Self {
            project,
            options,
            environment: None,
        }
    }

    pub fn with_environment(mut self, environment: &'a Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn project(&self) -> &'a Project {
        self.project
    }

    pub fn options(&self) -> &'a Options {
        self.options
    }

    pub fn environment(&self) -> Option<&'a Environment> {
        self.environment
    }

    /// Placeholder table for one entry: project, environment (deploy entries
    /// only), options and finally the owning service, later namespaces
    /// overriding earlier ones.
    pub fn values_for(&self, service: &Service, entry: &Entry) -> ConfigResult<Values> {
        let mut maps = vec![self.project.placeholder_values()];

        if entry.entry_type().requires_environment() {
            let environment = self
                .environment
                .ok_or(ConfigError::MissingSingleton(Kind::Environment))?;
            maps.push(environment.placeholder_values());
        }

        maps.push(self.options.placeholder_values());
        maps.push(service.placeholder_values());

        Ok(merge_values(&maps)?)
    }

    /// Resolve the spec of one of `service`'s entries. Repeatable; the entry
    /// is left untouched.
    pub fn resolve(&self, service: &Service, entry: &Entry) -> ConfigResult<Value> {
        debug!(
            service = service.name(),
            phase = %entry.entry_type(),
            index = entry.index(),
            executor = entry.executor_name(),
            "resolving entry spec"
        );
        let values = self.values_for(service, entry)?;
        Ok(replace_with_values(entry.raw_spec(), &values)?)
    }
}
