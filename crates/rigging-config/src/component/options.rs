use std::collections::BTreeMap;

use serde_json::json;

use super::{Identity, Kind, Metadata};
use crate::placeholders::ValueMap;

/// Origin reported for values supplied on the command line.
pub const COMMAND_LINE: &str = "<command line>";

/// Run options supplied by the command driver rather than by documents.
#[derive(Debug, Clone)]
pub struct Options {
    identity: Identity,
    params: BTreeMap<String, String>,
    tag: Option<String>,
}

impl Options {
    pub fn new() -> Self {
        Self {
            identity: Identity::new(Kind::Options, "options", Metadata::new(COMMAND_LINE, None)),
            params: BTreeMap::new(),
            tag: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// `Params.*` and `Tag`, also exposed under the `Options` namespace.
    pub fn placeholder_values(&self) -> ValueMap {
        let mut values = ValueMap::new();
        values.insert("Params".to_string(), json!(self.params));
        values.insert("Options.Params".to_string(), json!(self.params));
        if let Some(tag) = &self.tag {
            values.insert("Tag".to_string(), json!(tag));
            values.insert("Options.Tag".to_string(), json!(tag));
        }
        values
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}
