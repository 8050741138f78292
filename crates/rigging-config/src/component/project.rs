use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Value, json};

use super::{Identity, Kind, Metadata};
use crate::error::ConfigResult;
use crate::placeholders::ValueMap;

/// Root document of a project. Its `files` globs seed the discovery of every
/// other document.
#[derive(Debug, Clone)]
pub struct Project {
    identity: Identity,
    files: Vec<String>,
    variables: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDocument {
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    variables: BTreeMap<String, String>,
}

impl Project {
    pub fn new(name: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            identity: Identity::new(Kind::Project, name, metadata),
            files: Vec::new(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_files(mut self, files: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub(crate) fn decode(identity: Identity, document: Value) -> ConfigResult<Self> {
        let doc: ProjectDocument = serde_json::from_value(document)?;
        Ok(Self {
            identity,
            files: doc.files,
            variables: doc.variables,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    /// Globs relative to the project's directory.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn placeholder_values(&self) -> ValueMap {
        let mut values = ValueMap::new();
        values.insert("Project.Name".to_string(), json!(self.name()));
        values.insert(
            "Project.Dir".to_string(),
            json!(self.identity.directory().display().to_string()),
        );
        values.insert("Project.Vars".to_string(), json!(self.variables));
        values
    }
}
