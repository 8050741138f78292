//! `{{ .Path }}` placeholder flattening and expansion.
//!
//! Components contribute nested maps of values. [`merge_values`] flattens
//! them into a single case-insensitive table of dotted names and
//! [`replace_with_values`] expands markers in arbitrary decoded values
//! against that table. Table values may themselves contain markers; they
//! are expanded on demand while tracking the chain of names currently being
//! resolved, which is how cycles are detected.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::trace;

use crate::error::PlaceholderError;

/// Nested placeholder values as contributed by a single component.
pub type ValueMap = serde_json::Map<String, Value>;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\.[A-Za-z0-9_]+)+$").unwrap());
static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").unwrap());

/// Flattened placeholder table.
///
/// Keys are lowercased dotted names without the leading dot; the name as
/// originally spelled is kept for error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Values {
    entries: BTreeMap<String, (String, String)>,
}

impl Values {
    /// Look a name up, ignoring case. The leading dot is optional.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&id_of(name))
            .map(|(_, value)| value.as_str())
    }

    /// Every name with its leading dot, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .values()
            .map(|(name, _)| format!(".{name}"))
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, name: String, value: String) {
        self.entries.insert(id_of(&name), (name, value));
    }

    fn raw(&self, name: &str) -> Option<&(String, String)> {
        self.entries.get(&id_of(name))
    }
}

fn id_of(name: &str) -> String {
    name.strip_prefix('.').unwrap_or(name).to_lowercase()
}

/// Flatten one map into `(name, value)` pairs, breadth first.
///
/// Keys may already contain dots; `{"a": {"b.c": "d"}}` flattens to `a.b.c`.
fn flatten(values: &ValueMap) -> Result<Vec<(String, String)>, PlaceholderError> {
    let mut queue: VecDeque<(String, &ValueMap)> = VecDeque::from([(String::new(), values)]);
    let mut seen: HashMap<String, String> = HashMap::new();
    let mut result = Vec::new();

    while let Some((prefix, map)) = queue.pop_front() {
        for (key, value) in map {
            let name = format!("{prefix}.{key}");
            match value {
                Value::String(s) => {
                    let id = name.to_lowercase();
                    if let Some(first) = seen.get(&id) {
                        return Err(PlaceholderError::Duplicated {
                            first: first.clone(),
                            second: name,
                        });
                    }
                    seen.insert(id, name.clone());
                    result.push((name[1..].to_string(), s.clone()));
                }
                Value::Object(nested) => queue.push_back((name, nested)),
                other => {
                    return Err(PlaceholderError::InvalidValue {
                        name,
                        found: type_name(other).to_string(),
                    });
                }
            }
        }
    }

    Ok(result)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "map",
    }
}

/// Flatten and merge value maps into one table.
///
/// Within a single map two names differing only in case are ambiguous and
/// rejected. Across maps, later maps override earlier ones.
pub fn merge_values<'a>(
    maps: impl IntoIterator<Item = &'a ValueMap>,
) -> Result<Values, PlaceholderError> {
    let mut merged = Values::default();
    for map in maps {
        for (name, value) in flatten(map)? {
            merged.insert(name, value);
        }
    }
    Ok(merged)
}

/// Expand every marker in `value` using `values`.
///
/// The whole table is expanded first so that invalid names and cycles are
/// reported even when no marker in `value` refers to them. Values without
/// markers are returned unchanged, so expanding twice is a no-op.
pub fn replace_with_values(value: &Value, values: &Values) -> Result<Value, PlaceholderError> {
    let mut expander = Expander::new(values)?;
    expander.expand_table()?;
    expander.expand_value(value)
}

struct Expander<'a> {
    values: &'a Values,
    resolving: Vec<String>,
    expanded: HashMap<String, String>,
}

impl<'a> Expander<'a> {
    fn new(values: &'a Values) -> Result<Self, PlaceholderError> {
        for (name, _) in values.entries.values() {
            let dotted = format!(".{name}");
            if !NAME_RE.is_match(&dotted) {
                return Err(PlaceholderError::InvalidName { name: dotted });
            }
        }
        Ok(Self {
            values,
            resolving: Vec::new(),
            expanded: HashMap::new(),
        })
    }

    fn expand_table(&mut self) -> Result<(), PlaceholderError> {
        let values = self.values;
        for (name, _) in values.entries.values() {
            let name = format!(".{name}");
            self.lookup(&name)?;
        }
        Ok(())
    }

    fn lookup(&mut self, name: &str) -> Result<String, PlaceholderError> {
        let id = id_of(name);
        if let Some(done) = self.expanded.get(&id) {
            return Ok(done.clone());
        }

        let values = self.values;
        let (_, raw) = values
            .raw(name)
            .ok_or_else(|| PlaceholderError::Missing {
                name: name.to_string(),
                valid_names: values.names(),
            })?;

        if let Some(start) = self
            .resolving
            .iter()
            .position(|parent| parent.eq_ignore_ascii_case(name))
        {
            let mut cycle = self.resolving[start..].to_vec();
            cycle.push(name.to_string());
            return Err(PlaceholderError::Cyclic { cycle });
        }

        let value = if MARKER_RE.is_match(raw) {
            trace!(placeholder = name, "expanding nested placeholder");
            self.resolving.push(name.to_string());
            let result = self.expand_str(raw);
            self.resolving.pop();
            result?
        } else {
            raw.clone()
        };

        self.expanded.insert(id, value.clone());
        Ok(value)
    }

    fn expand_str(&mut self, text: &str) -> Result<String, PlaceholderError> {
        let mut output = String::with_capacity(text.len());
        let mut last = 0;

        for caps in MARKER_RE.captures_iter(text) {
            let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let path = path.as_str();
            if !NAME_RE.is_match(path) {
                return Err(PlaceholderError::InvalidName {
                    name: path.to_string(),
                });
            }
            output.push_str(&text[last..whole.start()]);
            output.push_str(&self.lookup(path)?);
            last = whole.end();
        }

        output.push_str(&text[last..]);
        Ok(output)
    }

    fn expand_value(&mut self, value: &Value) -> Result<Value, PlaceholderError> {
        match value {
            Value::String(s) if MARKER_RE.is_match(s) => Ok(Value::String(self.expand_str(s)?)),
            Value::Array(items) => items
                .iter()
                .map(|item| self.expand_value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut expanded = ValueMap::new();
                for (key, item) in map {
                    expanded.insert(key.clone(), self.expand_value(item)?);
                }
                Ok(Value::Object(expanded))
            }
            other => Ok(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn map(value: Value) -> ValueMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected map, got {other}"),
        }
    }

    fn table(value: Value) -> Values {
        merge_values([&map(value)]).unwrap()
    }

    #[test]
    fn test_merging_values_works() {
        let values = merge_values([&map(json!({ "a": "1" })), &map(json!({ "b": "2" }))]).unwrap();

        assert_eq!(values.len(), 2);
        assert_eq!(values.get("a"), Some("1"));
        assert_eq!(values.get(".b"), Some("2"));
    }

    #[test]
    fn test_merging_values_results_in_flattened_map() {
        let values = table(json!({ "a": { "b.c": "d" } }));

        assert_eq!(values.names(), vec![".a.b.c"]);
        assert_eq!(values.get("A.B.C"), Some("d"));
    }

    #[test]
    fn test_merging_values_fails_on_name_conflicts_within_single_argument() {
        let input = map(json!({ "Foo": { "Bar": "" }, "foo.bar": "" }));

        let err = merge_values([&input]).unwrap_err();

        assert_eq!(
            err,
            PlaceholderError::Duplicated {
                first: ".foo.bar".to_string(),
                second: ".Foo.Bar".to_string(),
            }
        );
    }

    #[test]
    fn test_merging_values_overrides_between_separate_arguments() {
        let values = merge_values([
            &map(json!({ "a": { "b": "1" } })),
            &map(json!({ "A": { "b": "2" } })),
        ])
        .unwrap();

        assert_eq!(values.len(), 1);
        assert_eq!(values.get("a.b"), Some("2"));
    }

    #[test]
    fn test_merging_values_rejects_non_string_leaves() {
        let err = merge_values([&map(json!({ "a": { "b": 1 } }))]).unwrap_err();

        assert_eq!(
            err,
            PlaceholderError::InvalidValue {
                name: ".a.b".to_string(),
                found: "number".to_string(),
            }
        );
    }

    #[test]
    fn test_replacing_walks_nested_values() {
        let values = table(json!({ "Project": { "Name": "shop" }, "Tag": "1.0" }));
        let spec = json!({
            "image": "{{ .Project.Name }}:{{.tag}}",
            "args": ["--name", "{{ .project.name }}"],
            "replicas": 3,
            "enabled": true,
        });

        let result = replace_with_values(&spec, &values).unwrap();

        assert_eq!(
            result,
            json!({
                "image": "shop:1.0",
                "args": ["--name", "shop"],
                "replicas": 3,
                "enabled": true,
            })
        );
    }

    #[test]
    fn test_replacing_expands_nested_placeholders() {
        let values = table(json!({
            "a": "{{ .b }}-a",
            "b": "{{ .c }}-b",
            "c": "c",
        }));

        let result = replace_with_values(&json!("{{ .a }}"), &values).unwrap();

        assert_eq!(result, json!("c-b-a"));
    }

    #[test]
    fn test_replacing_is_idempotent() {
        let values = table(json!({ "a": "x" }));
        let once = replace_with_values(&json!(["{{ .a }}", "plain"]), &values).unwrap();
        let twice = replace_with_values(&once, &values).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let values = table(json!({ "a": "{{ .a }}" }));

        let err = replace_with_values(&json!("plain"), &values).unwrap_err();

        assert_eq!(
            err,
            PlaceholderError::Cyclic {
                cycle: vec![".a".to_string(), ".a".to_string()],
            }
        );
    }

    #[test]
    fn test_longer_cycle_reports_full_chain() {
        let values = table(json!({ "a": "{{ .b }}", "b": "{{ .c }}", "c": "{{ .A }}" }));

        let err = replace_with_values(&json!("{{ .a }}"), &values).unwrap_err();

        assert_eq!(
            err,
            PlaceholderError::Cyclic {
                cycle: vec![
                    ".a".to_string(),
                    ".b".to_string(),
                    ".c".to_string(),
                    ".A".to_string()
                ],
            }
        );
    }

    #[test]
    fn test_missing_placeholder_lists_sorted_names() {
        let values = table(json!({ "b": "1", "a": { "z": "2" } }));

        let err = replace_with_values(&json!("{{ .nope }}"), &values).unwrap_err();

        assert_eq!(
            err,
            PlaceholderError::Missing {
                name: ".nope".to_string(),
                valid_names: vec![".a.z".to_string(), ".b".to_string()],
            }
        );
    }

    #[test]
    fn test_invalid_marker_name() {
        let values = table(json!({ "a": "1" }));

        let err = replace_with_values(&json!("{{ a b }}"), &values).unwrap_err();

        assert_eq!(
            err,
            PlaceholderError::InvalidName {
                name: "a b".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_table_name() {
        let values = table(json!({ "bad-name": "1" }));

        let err = replace_with_values(&json!("plain"), &values).unwrap_err();

        assert_eq!(
            err,
            PlaceholderError::InvalidName {
                name: ".bad-name".to_string(),
            }
        );
    }
}
