//! Typed configuration components.
//!
//! Every YAML document is decoded exactly once into a [`Component`]. The
//! variant is chosen from the document's `kind` at decode time; everything
//! after that works through the uniform methods on [`Component`].

mod entry;
mod environment;
mod executor;
mod options;
mod project;
mod service;

pub use entry::{Entry, EntryType};
pub use environment::Environment;
pub use executor::Executor;
pub use options::Options;
pub use project::Project;
pub use service::Service;

use std::fmt;
use std::path::{Path, PathBuf};

use derive_more::Display;
use serde::Deserialize;
use serde_json::Value;

use crate::blueprint::Mode;
use crate::error::{ConfigError, ConfigResult, ErrorList};
use crate::resolve::Scope;
use crate::schema::CURRENT_API_VERSION;

/// Component kinds. `Options` never comes from a document; the command
/// driver registers it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum Kind {
    #[display("builder")]
    Builder,
    #[display("deployer")]
    Deployer,
    #[display("environment")]
    Environment,
    #[display("options")]
    Options,
    #[display("project")]
    Project,
    #[display("pusher")]
    Pusher,
    #[display("service")]
    Service,
    #[display("tagger")]
    Tagger,
}

impl Kind {
    /// Kinds that may appear in a document's `kind` field.
    pub const DOCUMENT_KINDS: [Kind; 7] = [
        Kind::Builder,
        Kind::Deployer,
        Kind::Environment,
        Kind::Project,
        Kind::Pusher,
        Kind::Service,
        Kind::Tagger,
    ];

    /// Parse a document `kind` value (`Service`, `Builder`, ...), ignoring case.
    pub fn from_document(kind: &str) -> Option<Kind> {
        Self::DOCUMENT_KINDS
            .into_iter()
            .find(|k| k.to_string().eq_ignore_ascii_case(kind))
    }

    pub fn is_executor(self) -> bool {
        matches!(
            self,
            Kind::Builder | Kind::Deployer | Kind::Pusher | Kind::Tagger
        )
    }
}

/// Where a component was defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Metadata {
    filename: PathBuf,
    line: Option<usize>,
}

impl Metadata {
    pub fn new(filename: impl Into<PathBuf>, line: Option<usize>) -> Self {
        Self {
            filename: filename.into(),
            line,
        }
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// Parent directory of the defining file.
    pub fn directory(&self) -> PathBuf {
        self.filename
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.filename.display(), line),
            None => write!(f, "{}", self.filename.display()),
        }
    }
}

/// Kind, name and provenance shared by every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    kind: Kind,
    name: String,
    metadata: Metadata,
}

impl Identity {
    pub fn new(kind: Kind, name: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            kind,
            name: name.into(),
            metadata,
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn directory(&self) -> PathBuf {
        self.metadata.directory()
    }

    /// Human readable name, e.g. `service "api"`.
    pub fn display_name(&self) -> String {
        format!("{} {:?}", self.kind, self.name)
    }
}

#[derive(Debug, Clone)]
pub enum Component {
    Project(Project),
    Service(Service),
    Environment(Environment),
    Executor(Executor),
    Options(Options),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Header {
    api_version: String,
    kind: String,
    #[serde(default)]
    name: Option<String>,
}

impl Component {
    /// Decode a single current-version document.
    pub fn decode(mode: Mode, metadata: Metadata, document: Value) -> ConfigResult<Component> {
        let header: Header = serde_json::from_value(document.clone())?;

        if header.api_version != CURRENT_API_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                version: header.api_version,
                supported: vec![CURRENT_API_VERSION.to_string()],
            });
        }

        let kind = Kind::from_document(&header.kind)
            .ok_or_else(|| ConfigError::UnknownKind(header.kind.clone()))?;
        let name = header
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ConfigError::MissingField("name".to_string()))?;
        let identity = Identity::new(kind, name, metadata);

        let component = match kind {
            Kind::Project => Component::Project(Project::decode(identity, document)?),
            Kind::Service => Component::Service(Service::decode(mode, identity, document)?),
            Kind::Environment => Component::Environment(Environment::decode(identity, document)?),
            Kind::Builder | Kind::Deployer | Kind::Pusher | Kind::Tagger => {
                Component::Executor(Executor::decode(identity, document)?)
            }
            Kind::Options => return Err(ConfigError::UnknownKind(header.kind)),
        };

        Ok(component)
    }

    pub fn identity(&self) -> &Identity {
        match self {
            Component::Project(p) => p.identity(),
            Component::Service(s) => s.identity(),
            Component::Environment(e) => e.identity(),
            Component::Executor(e) => e.identity(),
            Component::Options(o) => o.identity(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.identity().kind()
    }

    pub fn name(&self) -> &str {
        self.identity().name()
    }

    pub fn metadata(&self) -> &Metadata {
        self.identity().metadata()
    }

    pub fn directory(&self) -> PathBuf {
        self.identity().directory()
    }

    pub fn display_name(&self) -> String {
        self.identity().display_name()
    }

    /// Structural validation against the rest of the object graph.
    ///
    /// `scope` is `None` when the run singletons could not be established;
    /// executor references are still checked but entry specs are not resolved.
    pub fn validate(
        &self,
        objects: &dyn ObjectCollection,
        scope: Option<&Scope<'_>>,
    ) -> Result<(), ErrorList> {
        match self {
            Component::Environment(e) => e.validate(objects),
            Component::Service(s) => s.validate(objects, scope),
            Component::Project(_) | Component::Executor(_) | Component::Options(_) => Ok(()),
        }
    }

    pub fn as_project(&self) -> Option<&Project> {
        match self {
            Component::Project(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_service(&self) -> Option<&Service> {
        match self {
            Component::Service(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_environment(&self) -> Option<&Environment> {
        match self {
            Component::Environment(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_executor(&self) -> Option<&Executor> {
        match self {
            Component::Executor(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_options(&self) -> Option<&Options> {
        match self {
            Component::Options(o) => Some(o),
            _ => None,
        }
    }
}

impl From<Project> for Component {
    fn from(p: Project) -> Self {
        Component::Project(p)
    }
}

impl From<Service> for Component {
    fn from(s: Service) -> Self {
        Component::Service(s)
    }
}

impl From<Environment> for Component {
    fn from(e: Environment) -> Self {
        Component::Environment(e)
    }
}

impl From<Executor> for Component {
    fn from(e: Executor) -> Self {
        Component::Executor(e)
    }
}

impl From<Options> for Component {
    fn from(o: Options) -> Self {
        Component::Options(o)
    }
}

/// Read access to the registered object graph.
pub trait ObjectCollection {
    fn get_object(&self, kind: Kind, name: &str) -> Option<&Component>;

    /// All components of `kind`, sorted by name.
    fn get_objects_by_kind(&self, kind: Kind) -> Vec<&Component>;

    /// The only component of `kind`.
    ///
    /// # Panics
    ///
    /// Panics when more than one component of `kind` is registered. Callers
    /// must have checked the singleton constraint beforehand (see
    /// [`crate::Blueprint::scope`]), so reaching this is a logic error.
    fn get_unique_object(&self, kind: Kind) -> Option<&Component> {
        let objects = self.get_objects_by_kind(kind);
        match objects.as_slice() {
            [] => None,
            [only] => Some(*only),
            _ => panic!("duplicated object of kind {kind}"),
        }
    }

    fn get_executor(&self, kind: Kind, name: &str) -> Option<&Executor> {
        self.get_object(kind, name).and_then(Component::as_executor)
    }
}
