use derive_more::Display;
use serde::Serialize;
use serde_json::Value;

use super::Kind;

/// The phase an entry takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    #[display("build")]
    Build,
    #[display("deploy")]
    Deploy,
    #[display("push")]
    Push,
    #[display("tag")]
    Tag,
}

impl EntryType {
    /// Kind of executor that runs entries of this type.
    pub fn executor_kind(self) -> Kind {
        match self {
            EntryType::Build => Kind::Builder,
            EntryType::Deploy => Kind::Deployer,
            EntryType::Push => Kind::Pusher,
            EntryType::Tag => Kind::Tagger,
        }
    }

    pub fn requires_environment(self) -> bool {
        self == EntryType::Deploy
    }
}

/// One tag, build, push or deploy step of a service.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    index: usize,
    entry_type: EntryType,
    executor_name: String,
    spec: Value,
}

impl Entry {
    pub(crate) fn new(
        index: usize,
        entry_type: EntryType,
        executor_name: String,
        spec: Value,
    ) -> Self {
        Self {
            index,
            entry_type,
            executor_name,
            spec,
        }
    }

    /// Position in the source array; stable across resolutions.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn executor_kind(&self) -> Kind {
        self.entry_type.executor_kind()
    }

    pub fn executor_name(&self) -> &str {
        &self.executor_name
    }

    /// The spec as written, before placeholder expansion.
    pub fn raw_spec(&self) -> &Value {
        &self.spec
    }
}
