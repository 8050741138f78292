use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Value, json};
use tracing::debug;

use super::{
    LEGACY_API_VERSION, Preprocessor, api_version, at_document, parse_document,
    unsupported_version,
};
use crate::component::Kind;
use crate::document::{join_documents, split_documents};
use crate::error::{ConfigError, ConfigResult};
use crate::placeholders::ValueMap;

static LEGACY_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\s*)(\.[A-Za-z0-9_.]+)(\s*)\}\}").unwrap());

/// Keys synthesized by service migration; a legacy document must not define them.
const RESERVED_SERVICE_KEYS: [&str; 4] = ["artifacts", "releases", "tags", "tasks"];

/// Upgrades legacy documents to a target version.
///
/// Documents already at the target version are left byte-for-byte intact;
/// every other document is rewritten and re-serialized.
#[derive(Debug, Clone)]
pub struct Migrator {
    target: String,
}

impl Migrator {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Migrate a (possibly multi-document) YAML stream.
    pub fn migrate(&self, text: &str) -> ConfigResult<String> {
        let mut documents = split_documents(text);
        let mut changed = false;

        for raw in &mut documents {
            let migrated = parse_document(raw)
                .and_then(|parsed| match parsed {
                    Some(document) => self.migrate_document(document),
                    None => Ok(None),
                })
                .map_err(|e| at_document(raw, e))?;

            if let Some(document) = migrated {
                let body = serde_yaml::to_string(&document)?;
                raw.replace_body(body);
                changed = true;
            }
        }

        if changed {
            Ok(join_documents(&documents))
        } else {
            Ok(text.to_string())
        }
    }

    /// `None` when the document is already at the target version.
    fn migrate_document(&self, document: Value) -> ConfigResult<Option<Value>> {
        let version = api_version(&document)?;
        if version == self.target {
            return Ok(None);
        }
        if version != LEGACY_API_VERSION {
            return Err(unsupported_version(version));
        }

        let Value::Object(mut doc) = document else {
            return Err(ConfigError::InvalidValue {
                field: "document".to_string(),
                message: "expected a mapping".to_string(),
            });
        };

        let kind = doc
            .get("kind")
            .and_then(Value::as_str)
            .and_then(Kind::from_document);
        debug!(?kind, from = LEGACY_API_VERSION, to = %self.target, "migrating document");

        doc.insert("apiVersion".to_string(), json!(self.target));
        match kind {
            Some(Kind::Service) => migrate_service(&mut doc)?,
            Some(Kind::Project) => migrate_project(&mut doc)?,
            _ => {}
        }

        let mut migrated = Value::Object(doc);
        rewrite_placeholders(&mut migrated);
        Ok(Some(migrated))
    }
}

impl Preprocessor for Migrator {
    fn process(&self, text: &str) -> ConfigResult<String> {
        self.migrate(text)
    }
}

fn reserved(key: &str, kind: Kind) -> ConfigError {
    ConfigError::ReservedKey {
        key: key.to_string(),
        kind: kind.to_string(),
        version: LEGACY_API_VERSION.to_string(),
    }
}

fn migrate_service(doc: &mut ValueMap) -> ConfigResult<()> {
    if let Some(key) = RESERVED_SERVICE_KEYS.iter().find(|k| doc.contains_key(**k)) {
        return Err(reserved(key, Kind::Service));
    }

    let build = doc.shift_remove("build");
    let deploy = doc.shift_remove("deploy");
    let hooks = doc.shift_remove("hooks").unwrap_or(Value::Null);
    let hook = |name: &str| hook_lines(&hooks, name);

    if let Some(mut build) = build {
        if let Some(Value::Object(policy)) = field(&mut build, "tagPolicy") {
            let tags: Vec<Value> = policy
                .into_iter()
                .map(|(name, spec)| Value::Object(ValueMap::from_iter([(name, spec)])))
                .collect();
            doc.insert("tags".to_string(), Value::Array(tags));
        }

        let mut artifacts = Vec::new();
        artifacts.extend(hook_entry(hook("pre-build")?, true));
        artifacts.extend(array(field(&mut build, "artifacts"), "build.artifacts")?);
        artifacts.extend(hook_entry(hook("post-build")?, true));
        doc.insert("artifacts".to_string(), Value::Array(artifacts));
    }

    if let Some(mut deploy) = deploy {
        let mut releases = Vec::new();
        releases.extend(hook_entry(hook("pre-deploy")?, false));
        releases.extend(array(field(&mut deploy, "releases"), "deploy.releases")?);
        releases.extend(hook_entry(hook("post-deploy")?, false));
        doc.insert("releases".to_string(), Value::Array(releases));
    }

    Ok(())
}

fn migrate_project(doc: &mut ValueMap) -> ConfigResult<()> {
    if doc.contains_key("files") {
        return Err(reserved("files", Kind::Project));
    }

    if !doc.contains_key("name") {
        doc.insert("name".to_string(), json!("project"));
    }

    let services = directories(doc.shift_remove("services"), "services", "services/*")?;
    let environments = directories(
        doc.shift_remove("environments"),
        "environments",
        "environments/*",
    )?;

    let files: Vec<Value> = services
        .iter()
        .map(|dir| in_directory(dir, "service.yaml"))
        .chain(
            environments
                .iter()
                .map(|dir| in_directory(dir, "environment.yaml")),
        )
        .map(Value::String)
        .collect();
    doc.insert("files".to_string(), Value::Array(files));

    Ok(())
}

fn field(value: &mut Value, key: &str) -> Option<Value> {
    value.as_object_mut().and_then(|map| map.shift_remove(key))
}

fn array(value: Option<Value>, name: &str) -> ConfigResult<Vec<Value>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(ConfigError::InvalidValue {
            field: name.to_string(),
            message: format!("expected a sequence, found {other}"),
        }),
    }
}

fn hook_lines(hooks: &Value, name: &str) -> ConfigResult<Vec<String>> {
    let items = array(hooks.get(name).cloned(), &format!("hooks.{name}"))?;
    items
        .into_iter()
        .map(|item| match item {
            Value::String(line) => Ok(line),
            other => Err(ConfigError::InvalidValue {
                field: format!("hooks.{name}"),
                message: format!("expected a command string, found {other}"),
            }),
        })
        .collect()
}

/// Hook commands become a single `script` entry run with `set -e`.
fn hook_entry(lines: Vec<String>, build_phase: bool) -> Option<Value> {
    if lines.is_empty() {
        return None;
    }

    let mut sh = String::from("set -e\n");
    for line in lines {
        sh.push_str(&line);
        sh.push('\n');
    }

    let mut entry = json!({ "script": { "sh": sh } });
    if build_phase {
        entry["push"] = json!(false);
    }
    Some(entry)
}

fn directories(value: Option<Value>, name: &str, default: &str) -> ConfigResult<Vec<String>> {
    match value {
        None => Ok(vec![default.to_string()]),
        Some(value) => array(Some(value), name)?
            .into_iter()
            .map(|item| match item {
                Value::String(dir) => Ok(dir),
                other => Err(ConfigError::InvalidValue {
                    field: name.to_string(),
                    message: format!("expected a directory, found {other}"),
                }),
            })
            .collect(),
    }
}

fn in_directory(dir: &str, file: &str) -> String {
    match dir.trim_end_matches('/') {
        "" | "." => file.to_string(),
        dir => format!("{dir}/{file}"),
    }
}

fn rewrite_name(name: &str) -> String {
    match name {
        ".Dirs.Project" => ".Project.Dir".to_string(),
        ".Dirs.Environment" => ".Environment.Dir".to_string(),
        ".Dirs.Service" => ".Service.Dir".to_string(),
        ".Opts.Tag" => ".Tag".to_string(),
        _ => match name.strip_prefix(".Env.") {
            Some(var) => format!(".Environment.Vars.{var}"),
            None => name.to_string(),
        },
    }
}

fn rewrite_placeholders(value: &mut Value) {
    match value {
        Value::String(s) => {
            if LEGACY_MARKER_RE.is_match(s) {
                let rewritten = LEGACY_MARKER_RE.replace_all(s, |caps: &Captures<'_>| {
                    format!("{{{{{}{}{}}}}}", &caps[1], rewrite_name(&caps[2]), &caps[3])
                });
                *s = rewritten.into_owned();
            }
        }
        Value::Array(items) => items.iter_mut().for_each(rewrite_placeholders),
        Value::Object(map) => map.values_mut().for_each(rewrite_placeholders),
        _ => {}
    }
}
