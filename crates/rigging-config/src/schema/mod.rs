//! Document schema versions, validation and migration.
//!
//! Files pass through a chain of [`Preprocessor`]s before they are decoded.
//! The default chain first checks every document against the schema of its
//! declared version ([`SchemaValidator`]) and then upgrades legacy documents
//! to the current version ([`Migrator`]).

mod migrate;
mod validate;

pub use migrate::Migrator;
pub use validate::SchemaValidator;

use crate::document::RawDocument;
use crate::error::{ConfigError, ConfigResult};

/// Oldest supported document version, upgraded on load.
pub const LEGACY_API_VERSION: &str = "g2a-cli/v1beta4";

/// Version every document is decoded at.
pub const CURRENT_API_VERSION: &str = "g2a-cli/v2.0";

/// Versions accepted in `apiVersion`.
pub const SUPPORTED_API_VERSIONS: [&str; 2] = [LEGACY_API_VERSION, CURRENT_API_VERSION];

/// Text-to-text transformation applied to a whole file before decoding.
pub trait Preprocessor: Send + Sync {
    fn process(&self, text: &str) -> ConfigResult<String>;
}

/// Attach the document's position to an error raised while processing it.
pub(crate) fn at_document(document: &RawDocument, error: ConfigError) -> ConfigError {
    match document.line {
        Some(line) => ConfigError::Document {
            line,
            source: Box::new(error),
        },
        None => error,
    }
}

/// Parse one raw document. Blank documents yield `None`.
pub(crate) fn parse_document(
    document: &RawDocument,
) -> ConfigResult<Option<serde_json::Value>> {
    if document.is_empty() {
        return Ok(None);
    }
    let value: serde_json::Value = serde_yaml::from_str(&document.body)?;
    Ok((!value.is_null()).then_some(value))
}

/// `apiVersion` of a parsed document.
pub(crate) fn api_version(document: &serde_json::Value) -> ConfigResult<&str> {
    document
        .get("apiVersion")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ConfigError::MissingField("apiVersion".to_string()))
}

pub(crate) fn unsupported_version(version: &str) -> ConfigError {
    ConfigError::UnsupportedVersion {
        version: version.to_string(),
        supported: SUPPORTED_API_VERSIONS.iter().map(|v| v.to_string()).collect(),
    }
}
