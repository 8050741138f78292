//! The object registry for one run.
//!
//! A [`Blueprint`] owns every component decoded for a build or deploy run,
//! keyed by kind and name. Loading starts from a single glob (usually the
//! project file) and keeps following the `files` globs of loaded projects
//! until no new file turns up.

use std::collections::BTreeMap;

use derive_more::Display;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::component::{
    Component, Entry, EntryType, Environment, Kind, ObjectCollection, Options, Project, Service,
};
use crate::error::{ConfigError, ConfigResult, ErrorList};
use crate::loader::{self, DiscoveryQueue};
use crate::plan::{self, Plan};
use crate::resolve::Scope;
use crate::schema::{CURRENT_API_VERSION, Migrator, Preprocessor, SchemaValidator};

/// What the run is for. Decides the shape services are decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[display("build")]
    Build,
    #[display("deploy")]
    Deploy,
}

/// Builder for a [`Blueprint`].
pub struct BlueprintBuilder {
    mode: Mode,
    services: Vec<String>,
    environment: Option<String>,
    preprocessors: Vec<Box<dyn Preprocessor>>,
}

impl BlueprintBuilder {
    /// Restrict the run to these services.
    pub fn services(mut self, services: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.services = services.into_iter().map(Into::into).collect();
        self
    }

    pub fn environment(mut self, name: impl Into<String>) -> Self {
        self.environment = Some(name.into());
        self
    }

    /// Append a preprocessor after the default schema validation and
    /// migration steps.
    pub fn preprocessor(mut self, preprocessor: impl Preprocessor + 'static) -> Self {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    pub fn build(self) -> ConfigResult<Blueprint> {
        if self.mode == Mode::Deploy && self.environment.is_none() {
            return Err(ConfigError::EnvironmentRequired);
        }

        Ok(Blueprint {
            mode: self.mode,
            services: self.services,
            environment: self.environment,
            preprocessors: self.preprocessors,
            objects: BTreeMap::new(),
            discovery: DiscoveryQueue::default(),
        })
    }
}

pub struct Blueprint {
    mode: Mode,
    services: Vec<String>,
    environment: Option<String>,
    preprocessors: Vec<Box<dyn Preprocessor>>,
    objects: BTreeMap<(Kind, String), Component>,
    discovery: DiscoveryQueue,
}

impl Blueprint {
    pub fn builder(mode: Mode) -> BlueprintBuilder {
        BlueprintBuilder {
            mode,
            services: Vec::new(),
            environment: None,
            preprocessors: vec![
                Box::new(SchemaValidator::new()),
                Box::new(Migrator::new(CURRENT_API_VERSION)),
            ],
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Name of the environment selected for a deploy run.
    pub fn environment_name(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// Load every document reachable from `glob`.
    ///
    /// Each file is read at most once across calls. The first failing file
    /// aborts loading.
    pub fn load(&mut self, glob: &str) -> ConfigResult<()> {
        self.discovery.push(loader::absolute_pattern(glob)?, None);

        while let Some(pending) = self.discovery.pop() {
            for path in pending.expand()? {
                if !self.discovery.visit(&path) {
                    continue;
                }

                let components = loader::read_documents(&path, self.mode, &self.preprocessors)?;
                for project in components.iter().filter_map(Component::as_project) {
                    for pattern in loader::project_globs(project) {
                        debug!(%pattern, project = project.name(), "discovered glob");
                        let declared_in = project.identity().metadata().clone();
                        self.discovery.push(pattern, Some(declared_in));
                    }
                }
                self.add_documents(components)?;
            }
        }

        info!(objects = self.objects.len(), "configuration loaded");
        Ok(())
    }

    /// Register components. A kind and name pair may only be registered once.
    pub fn add_documents<C: Into<Component>>(
        &mut self,
        components: impl IntoIterator<Item = C>,
    ) -> ConfigResult<()> {
        for component in components {
            let component = component.into();
            let key = (component.kind(), component.name().to_string());

            if let Some(existing) = self.objects.get(&key) {
                return Err(ConfigError::DuplicateObject(
                    component.display_name(),
                    existing.metadata().clone(),
                    component.metadata().clone(),
                ));
            }
            self.objects.insert(key, component);
        }
        Ok(())
    }

    /// Check the whole object graph, collecting every problem found.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = ErrorList::new();

        let scope = match self.scope() {
            Ok(scope) => Some(scope),
            Err(e) => {
                errors.push(e);
                None
            }
        };

        for component in self.objects.values() {
            errors.check(component.validate(self, scope.as_ref()));
        }

        let available = self.names(Kind::Service);
        for name in &self.services {
            if self.get_object(Kind::Service, name).is_none() {
                errors.push(ConfigError::MissingObject {
                    kind: Kind::Service,
                    name: name.clone(),
                    available: available.clone(),
                });
            }
        }

        errors.finish()
    }

    /// The run singletons: the project, the options and, for deploy runs,
    /// the selected environment.
    pub fn scope(&self) -> ConfigResult<Scope<'_>> {
        let project = self.get_project();
        let options = self.singleton(Kind::Options).and_then(|c| {
            c.as_options()
                .ok_or(ConfigError::MissingSingleton(Kind::Options))
        });
        let environment = self.selected_environment();

        match (project, options, environment) {
            (Ok(project), Ok(options), Ok(environment)) => {
                let scope = Scope::new(project, options);
                Ok(match environment {
                    Some(environment) => scope.with_environment(environment),
                    None => scope,
                })
            }
            (project, options, environment) => {
                let mut errors = ErrorList::new();
                errors.check(project);
                errors.check(options);
                errors.check(environment);
                Err(errors.into_error())
            }
        }
    }

    pub fn get_project(&self) -> ConfigResult<&Project> {
        self.singleton(Kind::Project).and_then(|c| {
            c.as_project()
                .ok_or(ConfigError::MissingSingleton(Kind::Project))
        })
    }

    pub fn get_environment(&self, name: &str) -> Option<&Environment> {
        self.get_object(Kind::Environment, name)
            .and_then(Component::as_environment)
    }

    pub fn get_options(&self) -> Option<&Options> {
        self.singleton(Kind::Options)
            .ok()
            .and_then(Component::as_options)
    }

    /// Services taking part in the run, in run order.
    ///
    /// Explicitly requested services come first; otherwise a deploy run uses
    /// the environment's `deployServices`; otherwise every service sorted by
    /// name. Names that do not resolve are skipped here and reported by
    /// [`Blueprint::validate`].
    pub fn list_services(&self) -> Vec<&Service> {
        let deploy_services: &[String] = match self.mode {
            Mode::Deploy => self
                .environment
                .as_deref()
                .and_then(|name| self.get_environment(name))
                .map(Environment::deploy_services)
                .unwrap_or_default(),
            Mode::Build => &[],
        };

        let names: &[String] = if !self.services.is_empty() {
            &self.services
        } else {
            deploy_services
        };

        if names.is_empty() {
            return self
                .get_objects_by_kind(Kind::Service)
                .into_iter()
                .filter_map(Component::as_service)
                .collect();
        }

        names
            .iter()
            .filter_map(|name| self.get_object(Kind::Service, name))
            .filter_map(Component::as_service)
            .collect()
    }

    /// Resolve one of `service`'s entries against this blueprint's singletons.
    pub fn resolve(&self, service: &Service, entry: &Entry) -> ConfigResult<Value> {
        self.scope()?.resolve(service, entry)
    }

    /// Resolve the given phases of every selected service.
    pub fn plan(&self, phases: &[EntryType]) -> ConfigResult<Plan> {
        let scope = self.scope()?;
        plan::build_plan(self, &scope, phases)
    }

    fn selected_environment(&self) -> ConfigResult<Option<&Environment>> {
        match (self.mode, &self.environment) {
            (Mode::Build, _) => Ok(None),
            (Mode::Deploy, None) => Err(ConfigError::EnvironmentRequired),
            (Mode::Deploy, Some(name)) => self.get_environment(name).map(Some).ok_or_else(|| {
                ConfigError::MissingObject {
                    kind: Kind::Environment,
                    name: name.clone(),
                    available: self.names(Kind::Environment),
                }
            }),
        }
    }

    fn singleton(&self, kind: Kind) -> ConfigResult<&Component> {
        match self.get_objects_by_kind(kind).as_slice() {
            [] => Err(ConfigError::MissingSingleton(kind)),
            [only] => Ok(*only),
            [first, second, ..] => Err(ConfigError::DuplicateObject(
                kind.to_string(),
                first.metadata().clone(),
                second.metadata().clone(),
            )),
        }
    }

    fn names(&self, kind: Kind) -> Vec<String> {
        self.get_objects_by_kind(kind)
            .into_iter()
            .map(|c| c.name().to_string())
            .collect()
    }
}

impl ObjectCollection for Blueprint {
    fn get_object(&self, kind: Kind, name: &str) -> Option<&Component> {
        self.objects.get(&(kind, name.to_string()))
    }

    fn get_objects_by_kind(&self, kind: Kind) -> Vec<&Component> {
        self.objects
            .range((kind, String::new())..)
            .take_while(|((k, _), _)| *k == kind)
            .map(|(_, component)| component)
            .collect()
    }
}
