//! Configuration resolution for Rigging.
//!
//! This crate turns a tree of YAML documents into a validated object graph:
//! - Document discovery from a project file and the globs it references
//! - Schema validation and migration of legacy documents
//! - A kind/name keyed registry with cross-reference validation
//! - `{{ .Path }}` placeholder expansion of entry specs

pub mod blueprint;
pub mod component;
pub mod document;
pub mod error;
mod loader;
pub mod placeholders;
pub mod plan;
pub mod resolve;
pub mod schema;
mod validation;

pub use blueprint::{Blueprint, BlueprintBuilder, Mode};
pub use component::{
    Component, Entry, EntryType, Environment, Executor, Identity, Kind, Metadata, ObjectCollection,
    Options, Project, Service,
};
pub use error::{ConfigError, ConfigResult, ErrorList, PlaceholderError};
pub use plan::Plan;
pub use resolve::Scope;
pub use schema::{CURRENT_API_VERSION, LEGACY_API_VERSION, Migrator, Preprocessor, SchemaValidator};
