//! File discovery and document decoding.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::blueprint::Mode;
use crate::component::{Component, Kind, Metadata, Project};
use crate::document::split_documents;
use crate::error::{ConfigError, ConfigResult};
use crate::schema::{Preprocessor, at_document, parse_document};

/// A glob waiting to be expanded, with the project document that declared
/// it. The root pattern has no declaring document.
#[derive(Debug, Clone)]
pub(crate) struct PendingGlob {
    pub pattern: String,
    pub declared_in: Option<Metadata>,
}

impl PendingGlob {
    /// Matching files. Failures of project-declared patterns name the
    /// declaring document.
    pub fn expand(&self) -> ConfigResult<Vec<PathBuf>> {
        expand_glob(&self.pattern).map_err(|source| match &self.declared_in {
            Some(origin) => ConfigError::Load {
                origin: origin.clone(),
                source: Box::new(source),
            },
            None => source,
        })
    }
}

/// Glob patterns still to expand and the files already read.
///
/// Projects add their `files` globs while loading is in progress, so the
/// full file set is only known once the queue drains. Patterns are cleaned
/// before they are queued, so every file has a single spelling.
#[derive(Debug, Default)]
pub(crate) struct DiscoveryQueue {
    pending: VecDeque<PendingGlob>,
    visited: HashSet<PathBuf>,
}

impl DiscoveryQueue {
    pub fn push(&mut self, pattern: String, declared_in: Option<Metadata>) {
        self.pending.push_back(PendingGlob {
            pattern,
            declared_in,
        });
    }

    pub fn pop(&mut self) -> Option<PendingGlob> {
        self.pending.pop_front()
    }

    /// Mark a file as read. `false` when it was read before.
    pub fn visit(&mut self, path: &Path) -> bool {
        self.visited.insert(path.to_path_buf())
    }
}

/// Make a pattern absolute against the working directory and clean it.
pub(crate) fn absolute_pattern(pattern: &str) -> ConfigResult<String> {
    if Path::new(pattern).is_absolute() {
        return Ok(clean_pattern(pattern));
    }
    let cwd = std::env::current_dir().map_err(|source| ConfigError::Io {
        path: PathBuf::from("."),
        source,
    })?;
    Ok(clean_pattern(&format!(
        "{}/{}",
        glob::Pattern::escape(&cwd.display().to_string()),
        pattern
    )))
}

/// Globs contributed by a project, anchored at its directory and cleaned.
pub(crate) fn project_globs(project: &Project) -> Vec<String> {
    let dir = glob::Pattern::escape(&project.identity().directory().display().to_string());
    project
        .files()
        .iter()
        .map(|file| clean_pattern(&format!("{dir}/{file}")))
        .collect()
}

/// Lexically clean a `/` separated pattern: empty and `.` components are
/// dropped and `..` removes the component before it. A `..` that would climb
/// above the root is dropped; leading `..` of a relative pattern is kept.
pub(crate) fn clean_pattern(pattern: &str) -> String {
    let rooted = pattern.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in pattern.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Files matching `pattern`, sorted. Directories are skipped.
pub(crate) fn expand_glob(pattern: &str) -> ConfigResult<Vec<PathBuf>> {
    let paths = glob::glob(pattern).map_err(|e| ConfigError::Glob {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| ConfigError::Io {
            path: e.path().to_path_buf(),
            source: e.into_error(),
        })?;
        if path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        warn!(pattern, "glob did not match any file");
    } else {
        debug!(pattern, matches = files.len(), "expanded glob");
    }
    Ok(files)
}

/// Read, preprocess and decode every document of one file.
///
/// Environments are dropped in build mode. Failures are wrapped with the
/// file name and, when known, the line of the offending document.
pub(crate) fn read_documents(
    path: &Path,
    mode: Mode,
    preprocessors: &[Box<dyn Preprocessor>],
) -> ConfigResult<Vec<Component>> {
    debug!(path = %path.display(), "loading file");

    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    decode_file(path, mode, preprocessors, bytes).map_err(|e| load_error(path, e))
}

fn decode_file(
    path: &Path,
    mode: Mode,
    preprocessors: &[Box<dyn Preprocessor>],
    bytes: Vec<u8>,
) -> ConfigResult<Vec<Component>> {
    let mut text = String::from_utf8(bytes).map_err(|e| ConfigError::InvalidValue {
        field: "encoding".to_string(),
        message: e.to_string(),
    })?;

    for preprocessor in preprocessors {
        text = preprocessor.process(&text)?;
    }

    let mut components = Vec::new();
    for raw in split_documents(&text) {
        let Some(document) = parse_document(&raw).map_err(|e| at_document(&raw, e))? else {
            continue;
        };

        let metadata = Metadata::new(path, raw.line);
        let component =
            Component::decode(mode, metadata, document).map_err(|e| at_document(&raw, e))?;

        if mode == Mode::Build && component.kind() == Kind::Environment {
            debug!(name = component.name(), "skipping environment in build mode");
            continue;
        }
        components.push(component);
    }

    Ok(components)
}

fn load_error(path: &Path, error: ConfigError) -> ConfigError {
    match error {
        ConfigError::Document { line, source } => ConfigError::Load {
            origin: Metadata::new(path, Some(line)),
            source,
        },
        other => ConfigError::Load {
            origin: Metadata::new(path, None),
            source: Box::new(other),
        },
    }
}
