use std::fmt;
use std::sync::Arc;

use jsonschema::JSONSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Identity, Metadata};
use crate::error::{ConfigError, ConfigResult};

/// A builder, deployer, pusher or tagger.
///
/// The script is opaque here; it is handed to the script runtime together
/// with resolved entry specs. The schema constrains those specs.
#[derive(Clone)]
pub struct Executor {
    identity: Identity,
    script: String,
    schema: Value,
    compiled: Arc<JSONSchema>,
}

#[derive(Deserialize)]
struct ExecutorDocument {
    #[serde(default = "accept_anything")]
    schema: Value,
    #[serde(default)]
    script: String,
}

fn accept_anything() -> Value {
    json!({})
}

impl Executor {
    /// Create an executor of an executor kind with the given spec schema.
    pub fn new(identity: Identity, schema: Value, script: impl Into<String>) -> ConfigResult<Self> {
        let compiled = JSONSchema::compile(&schema).map_err(|e| ConfigError::InvalidValue {
            field: format!("schema of {}", identity.display_name()),
            message: e.to_string(),
        })?;

        Ok(Self {
            identity,
            script: script.into(),
            schema,
            compiled: Arc::new(compiled),
        })
    }

    pub(crate) fn decode(identity: Identity, document: Value) -> ConfigResult<Self> {
        let doc: ExecutorDocument = serde_json::from_value(document)?;
        Self::new(identity, doc.schema, doc.script)
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

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Check a resolved spec against the schema, one message per violation.
    pub fn check_spec(&self, spec: &Value) -> Vec<String> {
        match self.compiled.validate(spec) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{path}: {e}")
                    }
                })
                .collect(),
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("identity", &self.identity)
            .field("schema", &self.schema)
            .field("script", &self.script)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Kind;

    fn tagger(schema: Value) -> Executor {
        let identity = Identity::new(Kind::Tagger, "test", Metadata::new("dir/file.yaml", None));
        Executor::new(identity, schema, "").unwrap()
    }

    #[test]
    fn test_empty_schema_accepts_anything() {
        let executor = tagger(json!({}));
        assert!(executor.check_spec(&json!("spec")).is_empty());
        assert!(executor.check_spec(&json!({ "a": [1, 2] })).is_empty());
    }

    #[test]
    fn test_required_property_violation_is_reported() {
        let executor = tagger(json!({ "required": ["foo"] }));

        assert!(executor.check_spec(&json!({ "foo": true })).is_empty());

        let messages = executor.check_spec(&json!({}));
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("foo"));
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let identity = Identity::new(Kind::Builder, "bad", Metadata::new("f.yaml", None));
        let result = Executor::new(identity, json!({ "type": 12 }), "");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
