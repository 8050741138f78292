//! Configuration resolution errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::component::{Kind, Metadata};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("file \"{origin}\" contains invalid document: {source}")]
    Load {
        origin: Metadata,
        source: Box<ConfigError>,
    },

    #[error("document at line {line}: {source}")]
    Document {
        line: usize,
        source: Box<ConfigError>,
    },

    #[error("cannot read \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid glob pattern \"{pattern}\": {message}")]
    Glob { pattern: String, message: String },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid document structure: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("unsupported apiVersion \"{version}\", supported versions: {}", supported.join(", "))]
    UnsupportedVersion {
        version: String,
        supported: Vec<String>,
    },

    #[error("unknown kind \"{0}\"")]
    UnknownKind(String),

    #[error("document does not match the {kind} schema:\n\t  {}", messages.join("\n\t  "))]
    InvalidDocument { kind: String, messages: Vec<String> },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("property \"{key}\" is reserved and cannot be used in {version} {kind} documents")]
    ReservedKey {
        key: String,
        kind: String,
        version: String,
    },

    #[error("{0} is duplicated, it's defined in:\n\t* {1}\n\t* {2}")]
    DuplicateObject(String, Metadata, Metadata),

    #[error("{kind} \"{name}\" does not exist, available {kind}s: {}", available.join(", "))]
    MissingObject {
        kind: Kind,
        name: String,
        available: Vec<String>,
    },

    #[error("cannot find {0}")]
    MissingSingleton(Kind),

    #[error(
        "missing service \"{service}\" deployed to environment \"{environment}\" defined in the file:\n\t  {origin}"
    )]
    UnknownDeployService {
        service: String,
        environment: String,
        origin: Metadata,
    },

    #[error("missing {kind} \"{name}\" used by service \"{service}\" defined in the file:\n\t  {origin}")]
    MissingExecutor {
        kind: Kind,
        name: String,
        service: String,
        origin: Metadata,
    },

    #[error(
        "{service} contains invalid configuration for {executor}:\n\t  {message}\n\t  Definition files:\n\t    {service_origin}\n\t    {executor_origin}"
    )]
    SchemaViolation {
        service: String,
        executor: String,
        message: String,
        service_origin: Metadata,
        executor_origin: Metadata,
    },

    #[error("cannot resolve {phase} entry #{index} of {service} defined in the file:\n\t  {origin}\n\t  {source}")]
    Resolution {
        service: String,
        phase: String,
        index: usize,
        origin: Metadata,
        source: Box<ConfigError>,
    },

    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),

    #[error("environment is required in deploy mode")]
    EnvironmentRequired,

    #[error(transparent)]
    Multiple(#[from] ErrorList),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Failures of placeholder flattening and expansion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
    #[error("placeholder names \"{first}\" and \"{second}\" are ambiguous, names are case-insensitive")]
    Duplicated { first: String, second: String },

    #[error("placeholder \"{name}\" does not exist, valid names: {}", valid_names.join(", "))]
    Missing {
        name: String,
        valid_names: Vec<String>,
    },

    #[error("placeholders contain a cycle: {}", cycle.join(" -> "))]
    Cyclic { cycle: Vec<String> },

    #[error("invalid placeholder name \"{name}\"")]
    InvalidName { name: String },

    #[error("invalid value of placeholder \"{name}\": expected string or map, found {found}")]
    InvalidValue { name: String, found: String },
}

/// Aggregate of independent errors collected in a single pass.
///
/// Validation never stops at the first problem; every failure is pushed here
/// and reported together. Nested lists are flattened on insertion so callers
/// always see the individual causes.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<ConfigError>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: impl Into<ConfigError>) {
        match error.into() {
            ConfigError::Multiple(list) => self.errors.extend(list.errors),
            other => self.errors.push(other),
        }
    }

    /// Collects the error side of a result, discarding the success value.
    pub fn check<T>(&mut self, result: Result<T, impl Into<ConfigError>>) {
        if let Err(e) = result {
            self.push(e);
        }
    }

    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ConfigError> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ErrorList> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Collapse into one error: the lone cause itself, or the whole list.
    pub fn into_error(mut self) -> ConfigError {
        if self.errors.len() == 1 {
            self.errors.remove(0)
        } else {
            ConfigError::Multiple(self)
        }
    }

    /// Like [`ErrorList::into_result`], but a lone error is returned as is.
    pub fn finish(self) -> ConfigResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.into_error())
        }
    }
}

impl Extend<ConfigError> for ErrorList {
    fn extend<I: IntoIterator<Item = ConfigError>>(&mut self, iter: I) {
        for error in iter {
            self.push(error);
        }
    }
}

impl From<ConfigError> for ErrorList {
    fn from(error: ConfigError) -> Self {
        let mut list = ErrorList::new();
        list.push(error);
        list
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            1 => writeln!(f, "1 error occurred:")?,
            n => writeln!(f, "{n} errors occurred:")?,
        }
        for error in &self.errors {
            writeln!(f, "\t* {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {}
