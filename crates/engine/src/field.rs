//! # Field Resolution
//!
//! Resolves property paths against resource records. A path is a dotted list
//! of property names, each optionally followed by numeric indices or a mapped
//! key:
//!
//! - `name`, `scheduling.preemptible`
//! - `disks[0].deviceName`
//! - `labels(env)` (equivalent to `labels.env`)
//! - `networkInterfaces` on its own reads the `networkIP` of the last
//!   interface
//!
//! Paths are parsed once into a [`FieldPath`] so syntax errors surface when a
//! rule set is compiled rather than per record.

use std::fmt;

use nodemap_types::ResourceRecord;
use serde_json::Value;

use crate::error::ResolutionError;

/// Property holding the record's network interface list.
pub const NETWORK_INTERFACES: &str = "networkInterfaces";
const NETWORK_ADDRESS_FIELD: &str = "networkIP";

/// Read access to a record's known fields.
pub trait FieldAccessor {
    /// The record's unique id, stringified.
    fn record_id(&self) -> &str;

    /// Top-level property lookup; `None` when the property is absent.
    fn property(&self, name: &str) -> Option<&Value>;

    /// Address of the record's network interfaces; the last interface wins.
    fn network_address(&self) -> Option<String> {
        let interfaces = self.property(NETWORK_INTERFACES)?.as_array()?;
        interfaces
            .last()?
            .get(NETWORK_ADDRESS_FIELD)
            .and_then(render_value)
    }
}

impl FieldAccessor for ResourceRecord {
    fn record_id(&self) -> &str {
        self.id()
    }

    fn property(&self, name: &str) -> Option<&Value> {
        ResourceRecord::property(self, name)
    }
}

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Property(String),
    Index(usize),
    MappedKey(String),
}

/// A parsed property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    kind: PathKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathKind {
    NetworkAddress,
    Segments(Vec<Segment>),
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, ResolutionError> {
        let trimmed = raw.trim();
        if trimmed == NETWORK_INTERFACES {
            return Ok(Self {
                raw: trimmed.to_string(),
                kind: PathKind::NetworkAddress,
            });
        }
        let segments = parse_segments(trimmed)?;
        Ok(Self {
            raw: trimmed.to_string(),
            kind: PathKind::Segments(segments),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments; empty for the network-address shorthand.
    pub fn segments(&self) -> &[Segment] {
        match &self.kind {
            PathKind::NetworkAddress => &[],
            PathKind::Segments(segments) => segments,
        }
    }

    /// Resolve this path against `record`.
    ///
    /// Returns `Ok(None)` when the field is absent, null, or renders empty.
    pub fn resolve<A: FieldAccessor + ?Sized>(&self, record: &A) -> Result<Option<String>, ResolutionError> {
        let segments = match &self.kind {
            PathKind::NetworkAddress => return Ok(record.network_address()),
            PathKind::Segments(segments) => segments,
        };
        let Some((Segment::Property(root), rest)) = segments.split_first() else {
            return Ok(None);
        };
        let Some(mut current) = record.property(root) else {
            return Ok(None);
        };
        for segment in rest {
            let next = match (segment, current) {
                (Segment::Property(key) | Segment::MappedKey(key), Value::Object(map)) => map.get(key),
                (Segment::Index(index), Value::Array(items)) => items.get(*index),
                (_, Value::Null) => None,
                (segment, other) => {
                    return Err(ResolutionError::NotTraversable {
                        path: self.raw.clone(),
                        segment: segment.to_string(),
                        found: value_kind(other),
                    });
                }
            };
            match next {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }
        Ok(render_value(current))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Property(name) => f.write_str(name),
            Segment::Index(index) => write!(f, "[{index}]"),
            Segment::MappedKey(key) => write!(f, "({key})"),
        }
    }
}

/// Parse and resolve `path` in one step.
pub fn resolve<A: FieldAccessor + ?Sized>(record: &A, path: &str) -> Result<Option<String>, ResolutionError> {
    FieldPath::parse(path)?.resolve(record)
}

fn parse_segments(path: &str) -> Result<Vec<Segment>, ResolutionError> {
    let mut segments = Vec::new();
    for part in split_dotted(path) {
        if part.is_empty() {
            return Err(ResolutionError::EmptySegment { path: path.to_string() });
        }
        parse_part(path, part, &mut segments)?;
    }
    Ok(segments)
}

/// Split on dots outside `[..]` and `(..)`, so mapped keys may contain dots.
fn split_dotted(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut closing = None;
    for (index, c) in path.char_indices() {
        match (closing, c) {
            (None, '.') => {
                parts.push(&path[start..index]);
                start = index + 1;
            }
            (None, '(') => closing = Some(')'),
            (None, '[') => closing = Some(']'),
            (Some(close), c) if c == close => closing = None,
            _ => {}
        }
    }
    parts.push(&path[start..]);
    parts
}

/// Parse `name`, `name[0][1]`, or `name(key)` into `segments`.
fn parse_part(path: &str, part: &str, segments: &mut Vec<Segment>) -> Result<(), ResolutionError> {
    let name_end = part.find(['[', '(']).unwrap_or(part.len());
    let name = &part[..name_end];
    if name.is_empty() {
        return Err(ResolutionError::EmptySegment { path: path.to_string() });
    }
    if let Some(character) = name.chars().find(|c| !is_name_char(*c)) {
        return Err(ResolutionError::InvalidCharacter {
            path: path.to_string(),
            character,
        });
    }
    segments.push(Segment::Property(name.to_string()));

    let mut rest = &part[name_end..];
    while !rest.is_empty() {
        if let Some(after_open) = rest.strip_prefix('[') {
            let close = after_open
                .find(']')
                .ok_or_else(|| ResolutionError::UnterminatedBracket { path: path.to_string(), open: '[' })?;
            let index_text = &after_open[..close];
            let index = index_text.parse::<usize>().map_err(|_| ResolutionError::InvalidIndex {
                path: path.to_string(),
                index: index_text.to_string(),
            })?;
            segments.push(Segment::Index(index));
            rest = &after_open[close + 1..];
        } else if let Some(after_open) = rest.strip_prefix('(') {
            let close = after_open
                .find(')')
                .ok_or_else(|| ResolutionError::UnterminatedBracket { path: path.to_string(), open: '(' })?;
            let key = &after_open[..close];
            if key.is_empty() {
                return Err(ResolutionError::EmptySegment { path: path.to_string() });
            }
            segments.push(Segment::MappedKey(key.to_string()));
            rest = &after_open[close + 1..];
        } else {
            let character = rest.chars().next().unwrap_or_default();
            return Err(ResolutionError::InvalidCharacter {
                path: path.to_string(),
                character,
            });
        }
    }
    Ok(())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Render a resolved value as a string.
///
/// - **Strings**: as-is, `None` when empty
/// - **Numbers/Booleans**: their textual form
/// - **Null**: `None`
/// - **Arrays of scalars**: non-empty elements joined with commas
/// - **Other arrays and objects**: compact JSON
fn render_value(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::Null => return None,
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(items) if items.iter().all(is_scalar) => items
            .iter()
            .filter_map(render_value)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    };
    (!rendered.is_empty()).then_some(rendered)
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance() -> ResourceRecord {
        ResourceRecord::from_value(json!({
            "id": "7001",
            "name": "web-1",
            "status": "RUNNING",
            "hostname": "",
            "tags": { "items": ["web", "east"], "fingerprint": "abc=" },
            "labels": { "env": "production", "team-owner": "infra" },
            "disks": [ { "deviceName": "boot", "diskSizeGb": "10" }, { "deviceName": "data" } ],
            "scheduling": { "preemptible": false },
            "networkInterfaces": [
                { "name": "nic0", "networkIP": "10.0.0.2" },
                { "name": "nic1", "networkIP": "10.0.1.7" }
            ]
        }))
        .expect("record")
    }

    #[test]
    fn resolves_nested_properties_and_indices() {
        let record = instance();
        assert_eq!(resolve(&record, "name").unwrap().as_deref(), Some("web-1"));
        assert_eq!(resolve(&record, "disks[1].deviceName").unwrap().as_deref(), Some("data"));
        assert_eq!(resolve(&record, "scheduling.preemptible").unwrap().as_deref(), Some("false"));
        assert_eq!(resolve(&record, "labels(team-owner)").unwrap().as_deref(), Some("infra"));
        assert_eq!(resolve(&record, "labels.env").unwrap().as_deref(), Some("production"));
    }

    #[test]
    fn scalar_arrays_render_comma_joined() {
        let record = instance();
        assert_eq!(resolve(&record, "tags.items").unwrap().as_deref(), Some("web,east"));
    }

    #[test]
    fn network_interfaces_shorthand_reads_last_address() {
        let record = instance();
        assert_eq!(resolve(&record, "networkInterfaces").unwrap().as_deref(), Some("10.0.1.7"));
        assert_eq!(resolve(&record, "networkInterfaces[0].networkIP").unwrap().as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn mapped_keys_may_contain_dots() {
        let record = ResourceRecord::from_value(json!({
            "id": "7002",
            "metadata": { "a.b": "dotted", "a": { "b": "nested" } }
        }))
        .expect("record");
        assert_eq!(resolve(&record, "metadata(a.b)").unwrap().as_deref(), Some("dotted"));
        assert_eq!(resolve(&record, "metadata.a.b").unwrap().as_deref(), Some("nested"));

        let path = FieldPath::parse("metadata(a.b).c").expect("path");
        assert_eq!(
            path.segments(),
            [
                Segment::Property("metadata".into()),
                Segment::MappedKey("a.b".into()),
                Segment::Property("c".into()),
            ]
        );
        assert!(matches!(FieldPath::parse("labels(a.b"), Err(ResolutionError::UnterminatedBracket { open: '(', .. })));
    }

    #[test]
    fn absent_and_empty_fields_resolve_to_none() {
        let record = instance();
        assert_eq!(resolve(&record, "hostname").unwrap(), None);
        assert_eq!(resolve(&record, "description").unwrap(), None);
        assert_eq!(resolve(&record, "labels.missing").unwrap(), None);
        assert_eq!(resolve(&record, "disks[9].deviceName").unwrap(), None);
        assert_eq!(resolve(&record, "disks[1].diskSizeGb").unwrap(), None);
    }

    #[test]
    fn malformed_paths_are_rejected_at_parse_time() {
        assert!(matches!(FieldPath::parse("a..b"), Err(ResolutionError::EmptySegment { .. })));
        assert!(matches!(FieldPath::parse("disks[0"), Err(ResolutionError::UnterminatedBracket { open: '[', .. })));
        assert!(matches!(FieldPath::parse("labels(env"), Err(ResolutionError::UnterminatedBracket { open: '(', .. })));
        assert!(matches!(FieldPath::parse("disks[x]"), Err(ResolutionError::InvalidIndex { .. })));
        assert!(matches!(
            FieldPath::parse("status=RUNNING"),
            Err(ResolutionError::InvalidCharacter { character: '=', .. })
        ));
        assert!(matches!(FieldPath::parse("disks[0]x"), Err(ResolutionError::InvalidCharacter { character: 'x', .. })));
    }

    #[test]
    fn stepping_into_a_scalar_is_an_error() {
        let record = instance();
        let error = resolve(&record, "name.first").expect_err("not traversable");
        assert!(matches!(error, ResolutionError::NotTraversable { found: "a string", .. }));
        assert_eq!(error.path(), "name.first");
        assert!(resolve(&record, "labels[0]").is_err());
    }

    #[test]
    fn object_values_render_as_json() {
        let record = instance();
        assert_eq!(resolve(&record, "scheduling").unwrap().as_deref(), Some(r#"{"preemptible":false}"#));
    }
}
