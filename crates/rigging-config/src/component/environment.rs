use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Value, json};

use super::{Identity, Kind, Metadata, ObjectCollection};
use crate::error::{ConfigError, ConfigResult, ErrorList};
use crate::placeholders::ValueMap;

/// A deployment target: the services deployed to it and its variables.
#[derive(Debug, Clone)]
pub struct Environment {
    identity: Identity,
    deploy_services: Vec<String>,
    variables: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentDocument {
    #[serde(default)]
    deploy_services: Vec<String>,
    #[serde(default)]
    variables: BTreeMap<String, String>,
}

impl Environment {
    pub fn new(name: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            identity: Identity::new(Kind::Environment, name, metadata),
            deploy_services: Vec::new(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_deploy_services(
        mut self,
        services: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.deploy_services = services.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub(crate) fn decode(identity: Identity, document: Value) -> ConfigResult<Self> {
        let doc: EnvironmentDocument = serde_json::from_value(document)?;
        Ok(Self {
            identity,
            deploy_services: doc.deploy_services,
            variables: doc.variables,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn deploy_services(&self) -> &[String] {
        &self.deploy_services
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub(crate) fn validate(&self, objects: &dyn ObjectCollection) -> Result<(), ErrorList> {
        let mut errors = ErrorList::new();
        for service in &self.deploy_services {
            if objects.get_object(Kind::Service, service).is_none() {
                errors.push(ConfigError::UnknownDeployService {
                    service: service.clone(),
                    environment: self.name().to_string(),
                    origin: Metadata::new(self.identity.metadata().filename(), None),
                });
            }
        }
        errors.into_result()
    }

    pub fn placeholder_values(&self) -> ValueMap {
        let mut values = ValueMap::new();
        values.insert("Environment.Name".to_string(), json!(self.name()));
        values.insert(
            "Environment.Dir".to_string(),
            json!(self.identity.directory().display().to_string()),
        );
        values.insert("Environment.Vars".to_string(), json!(self.variables));
        values
    }
}
