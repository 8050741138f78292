use serde::Deserialize;
use serde_json::Value;

use super::{Entry, EntryType, Identity, Kind, Metadata, ObjectCollection};
use crate::blueprint::Mode;
use crate::error::{ConfigError, ConfigResult, ErrorList};
use crate::placeholders::ValueMap;
use crate::resolve::Scope;
use crate::validation;

/// A deployable unit and its per-phase entries.
///
/// The shape depends on the run mode: build runs see tag, build and push
/// entries; deploy runs see deploy entries only.
#[derive(Debug, Clone)]
pub struct Service {
    identity: Identity,
    phases: Phases,
}

#[derive(Debug, Clone)]
enum Phases {
    Build {
        tags: Vec<Entry>,
        build: Vec<Entry>,
        push: Vec<Entry>,
    },
    Deploy {
        releases: Vec<Entry>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDocument {
    #[serde(default)]
    tags: Vec<ValueMap>,
    #[serde(default)]
    artifacts: Vec<ValueMap>,
    #[serde(default)]
    releases: Vec<ValueMap>,
}

impl Service {
    pub(crate) fn decode(mode: Mode, identity: Identity, document: Value) -> ConfigResult<Self> {
        let doc: ServiceDocument = serde_json::from_value(document)?;
        let phases = match mode {
            Mode::Build => {
                let mut tags = Vec::with_capacity(doc.tags.len());
                for (index, item) in doc.tags.into_iter().enumerate() {
                    let (name, spec) = single_executor(item, &format!("tags[{index}]"))?;
                    tags.push(Entry::new(index, EntryType::Tag, name, spec));
                }

                let mut build = Vec::with_capacity(doc.artifacts.len());
                let mut push = Vec::new();
                for (index, mut item) in doc.artifacts.into_iter().enumerate() {
                    let push_field = item.remove("push");
                    let (name, spec) = single_executor(item, &format!("artifacts[{index}]"))?;

                    match push_field {
                        None | Some(Value::Bool(true)) => {
                            push.push(Entry::new(
                                index,
                                EntryType::Push,
                                name.clone(),
                                spec.clone(),
                            ));
                        }
                        Some(Value::Bool(false)) => {}
                        Some(Value::Object(overridden)) => {
                            let field = format!("artifacts[{index}].push");
                            let (push_name, push_spec) = single_executor(overridden, &field)?;
                            push.push(Entry::new(index, EntryType::Push, push_name, push_spec));
                        }
                        Some(other) => {
                            return Err(ConfigError::InvalidValue {
                                field: format!("artifacts[{index}].push"),
                                message: format!("expected boolean or executor map, found {other}"),
                            });
                        }
                    }

                    build.push(Entry::new(index, EntryType::Build, name, spec));
                }

                Phases::Build { tags, build, push }
            }
            Mode::Deploy => {
                let mut releases = Vec::with_capacity(doc.releases.len());
                for (index, item) in doc.releases.into_iter().enumerate() {
                    let (name, spec) = single_executor(item, &format!("releases[{index}]"))?;
                    releases.push(Entry::new(index, EntryType::Deploy, name, spec));
                }
                Phases::Deploy { releases }
            }
        };

        Ok(Self { identity, phases })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn metadata(&self) -> &Metadata {
        self.identity.metadata()
    }

    /// Entry types of this service's shape, sorted by name.
    pub fn entry_types(&self) -> Vec<EntryType> {
        match self.phases {
            Phases::Build { .. } => vec![EntryType::Build, EntryType::Push, EntryType::Tag],
            Phases::Deploy { .. } => vec![EntryType::Deploy],
        }
    }

    /// Entries of one phase in declaration order; empty for phases the
    /// service's shape does not have.
    pub fn entries(&self, entry_type: EntryType) -> &[Entry] {
        match (&self.phases, entry_type) {
            (Phases::Build { tags, .. }, EntryType::Tag) => tags,
            (Phases::Build { build, .. }, EntryType::Build) => build,
            (Phases::Build { push, .. }, EntryType::Push) => push,
            (Phases::Deploy { releases }, EntryType::Deploy) => releases,
            _ => &[],
        }
    }

    pub(crate) fn validate(
        &self,
        objects: &dyn ObjectCollection,
        scope: Option<&Scope<'_>>,
    ) -> Result<(), ErrorList> {
        validation::validate_service(self, objects, scope).into_result()
    }

    pub fn placeholder_values(&self) -> ValueMap {
        let mut values = ValueMap::new();
        values.insert("Service.Name".to_string(), self.name().into());
        values.insert(
            "Service.Dir".to_string(),
            self.identity.directory().display().to_string().into(),
        );
        values
    }
}

/// Split a `{ <executor>: <spec> }` item into its executor name and spec.
fn single_executor(item: ValueMap, field: &str) -> ConfigResult<(String, Value)> {
    if item.len() != 1 {
        let names: Vec<&str> = item.keys().map(String::as_str).collect();
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!(
                "expected exactly one executor, found {}: [{}]",
                names.len(),
                names.join(", ")
            ),
        });
    }
    item.into_iter()
        .next()
        .ok_or_else(|| ConfigError::MissingField(field.to_string()))
}
