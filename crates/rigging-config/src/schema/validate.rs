use std::collections::BTreeMap;
use std::sync::LazyLock;

use jsonschema::JSONSchema;
use serde_json::{Value, json};
use tracing::debug;

use super::{
    CURRENT_API_VERSION, LEGACY_API_VERSION, Preprocessor, api_version, at_document,
    parse_document, unsupported_version,
};
use crate::component::Kind;
use crate::document::split_documents;
use crate::error::{ConfigError, ConfigResult};

/// A map with exactly one key: `{ <executor>: <spec> }`.
fn single_executor() -> Value {
    json!({ "type": "object", "minProperties": 1, "maxProperties": 1 })
}

fn string_list() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

fn string_map() -> Value {
    json!({ "type": "object", "additionalProperties": { "type": "string" } })
}

fn document(properties: Value) -> Value {
    let mut all = json!({
        "apiVersion": { "type": "string" },
        "kind": { "type": "string" },
        "name": { "type": "string", "minLength": 1 },
    });
    if let (Some(all), Value::Object(extra)) = (all.as_object_mut(), properties) {
        all.extend(extra);
    }
    json!({
        "type": "object",
        "required": ["apiVersion", "kind", "name"],
        "properties": all,
    })
}

fn kind_schema(kind: Kind) -> Value {
    match kind {
        Kind::Project => document(json!({
            "files": string_list(),
            "variables": string_map(),
        })),
        Kind::Environment => document(json!({
            "deployServices": string_list(),
            "variables": string_map(),
        })),
        Kind::Service => document(json!({
            "tags": { "type": "array", "items": single_executor() },
            "releases": { "type": "array", "items": single_executor() },
            "artifacts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "push": { "oneOf": [{ "type": "boolean" }, single_executor()] },
                    },
                    "anyOf": [
                        { "required": ["push"], "minProperties": 2, "maxProperties": 2 },
                        { "not": { "required": ["push"] }, "minProperties": 1, "maxProperties": 1 },
                    ],
                },
            },
        })),
        _ => document(json!({
            "schema": { "type": ["object", "boolean"] },
            "script": { "type": "string" },
        })),
    }
}

static SCHEMAS: LazyLock<BTreeMap<Kind, JSONSchema>> = LazyLock::new(|| {
    Kind::DOCUMENT_KINDS
        .into_iter()
        .map(|kind| (kind, JSONSchema::compile(&kind_schema(kind)).unwrap()))
        .collect()
});

/// Checks each document's version, kind and (for current-version documents)
/// structure. The text is returned unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate one parsed document.
    pub fn validate(&self, document: &Value) -> ConfigResult<()> {
        if !document.is_object() {
            return Err(ConfigError::InvalidValue {
                field: "document".to_string(),
                message: "expected a mapping".to_string(),
            });
        }

        let version = api_version(document)?;
        if version != LEGACY_API_VERSION && version != CURRENT_API_VERSION {
            return Err(unsupported_version(version));
        }

        let kind_name = document
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::MissingField("kind".to_string()))?;
        let kind = Kind::from_document(kind_name)
            .ok_or_else(|| ConfigError::UnknownKind(kind_name.to_string()))?;

        if version != CURRENT_API_VERSION {
            return Ok(());
        }

        let Some(schema) = SCHEMAS.get(&kind) else {
            return Err(ConfigError::UnknownKind(kind_name.to_string()));
        };
        if let Err(errors) = schema.validate(document) {
            let messages = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{path}: {e}")
                    }
                })
                .collect();
            return Err(ConfigError::InvalidDocument {
                kind: kind.to_string(),
                messages,
            });
        }

        Ok(())
    }
}

impl Preprocessor for SchemaValidator {
    fn process(&self, text: &str) -> ConfigResult<String> {
        for raw in split_documents(text) {
            let checked = parse_document(&raw).and_then(|parsed| match parsed {
                Some(document) => self.validate(&document),
                None => Ok(()),
            });
            checked.map_err(|e| at_document(&raw, e))?;
            if let Some(line) = raw.line {
                debug!(line, "document passed schema validation");
            }
        }
        Ok(text.to_string())
    }
}
