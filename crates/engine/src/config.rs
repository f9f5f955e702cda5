//! Loading the flat mapping configuration.
//!
//! A mapping file is either YAML/JSON whose top level maps keys to scalars,
//! or a `.properties` file of `key=value` lines. Without a file the embedded
//! default mapping is used.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nodemap_util::{config_file_path, expand_tilde};
use serde_yaml::Value;
use tracing::{debug, info};

use crate::error::MappingConfigError;
use crate::rules::MappingRuleSet;

/// Environment variable naming the mapping file.
pub const MAPPING_PATH_ENV: &str = "NODEMAP_MAPPING_PATH";
const MAPPING_FILE_NAME: &str = "mapping.yaml";
const DEFAULT_MAPPING: &str = include_str!("default_mapping.yaml");

/// The embedded default mapping.
pub fn default_mapping() -> MappingRuleSet {
    parse_yaml_entries(DEFAULT_MAPPING, Path::new("<default>"))
        .map(MappingRuleSet::from_entries)
        .unwrap_or_default()
}

/// Mapping file to load: `explicit`, else `NODEMAP_MAPPING_PATH`, else the
/// per-user file if it exists.
pub fn mapping_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit
        && !path.trim().is_empty()
    {
        return Some(expand_tilde(path));
    }
    if let Ok(path) = env::var(MAPPING_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Some(expand_tilde(&path));
    }
    let user_file = config_file_path(MAPPING_FILE_NAME);
    user_file.is_file().then_some(user_file)
}

/// Resolve and load the mapping, falling back to [`default_mapping`].
pub fn load_mapping(explicit: Option<&str>) -> Result<MappingRuleSet> {
    match mapping_path(explicit) {
        Some(path) => {
            let rules = load_mapping_from_path(&path).with_context(|| format!("Failed to load mapping from {}", path.display()))?;
            info!(path = %path.display(), keys = rules.entries().len(), "loaded mapping");
            Ok(rules)
        }
        None => {
            debug!("using built-in mapping");
            Ok(default_mapping())
        }
    }
}

/// Load a mapping file, choosing the format from its extension.
pub fn load_mapping_from_path(path: &Path) -> Result<MappingRuleSet, MappingConfigError> {
    let content = fs::read_to_string(path).map_err(|source| MappingConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let is_properties = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("properties"));
    let entries = if is_properties {
        parse_properties(&content)
    } else {
        parse_yaml_entries(&content, path)?
    };
    Ok(MappingRuleSet::from_entries(entries))
}

/// Parse a YAML or JSON document into flat entries.
fn parse_yaml_entries(content: &str, path: &Path) -> Result<BTreeMap<String, String>, MappingConfigError> {
    let document: Value = serde_yaml::from_str(content).map_err(|source| MappingConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let mapping = match document {
        Value::Null => return Ok(BTreeMap::new()),
        Value::Mapping(mapping) => mapping,
        _ => return Err(MappingConfigError::NotAMapping { path: path.to_path_buf() }),
    };

    let mut entries = BTreeMap::new();
    for (key, value) in mapping {
        let key = scalar_text(&key).ok_or_else(|| MappingConfigError::NotFlat {
            key: serde_yaml::to_string(&key).unwrap_or_default().trim().to_string(),
        })?;
        let value = scalar_text(&value).ok_or_else(|| MappingConfigError::NotFlat { key: key.clone() })?;
        entries.insert(key, value);
    }
    Ok(entries)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(text.clone()),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

/// Parse `.properties` content.
///
/// Follows the `java.util.Properties` line format: `=`, `:` or whitespace
/// separators, `#`/`!` comments at the start of a logical line, continuation
/// on an odd number of trailing backslashes, and `\t \n \r \f \uXXXX \X`
/// escapes in keys and values. Trailing whitespace is part of the value. A
/// malformed or surrogate `\u` escape is kept literally. Later keys replace
/// earlier ones.
fn parse_properties(content: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    let mut logical = String::new();
    let mut continuing = false;
    for line in content.lines() {
        let line = line.trim_start_matches(is_property_space);
        if !continuing && (line.is_empty() || line.starts_with(['#', '!'])) {
            continue;
        }
        if ends_with_escape(line) {
            logical.push_str(&line[..line.len() - 1]);
            continuing = true;
            continue;
        }
        logical.push_str(line);
        let (key, value) = split_property(&logical);
        entries.insert(key, value);
        logical.clear();
        continuing = false;
    }
    if continuing {
        let (key, value) = split_property(&logical);
        entries.insert(key, value);
    }
    entries
}

fn is_property_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{000c}')
}

fn ends_with_escape(line: &str) -> bool {
    line.bytes().rev().take_while(|byte| *byte == b'\\').count() % 2 == 1
}

/// Split a logical line at its first unescaped separator and unescape both halves.
fn split_property(line: &str) -> (String, String) {
    let mut escaped = false;
    let mut separator = None;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '=' || c == ':' || is_property_space(c) {
            separator = Some(index);
            break;
        }
    }
    let Some(index) = separator else {
        return (unescape(line), String::new());
    };
    let rest = line[index..].trim_start_matches(is_property_space);
    let rest = rest.strip_prefix(['=', ':']).unwrap_or(rest);
    (unescape(&line[..index]), unescape(rest.trim_start_matches(is_property_space)))
}

fn unescape(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => unescaped.push('\t'),
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some('f') => unescaped.push('\u{000c}'),
            Some('u') => {
                let rest = chars.as_str();
                match decode_unicode(rest) {
                    Some(decoded) => {
                        unescaped.push(decoded);
                        chars = rest[4..].chars();
                    }
                    None => unescaped.push_str("\\u"),
                }
            }
            Some(other) => unescaped.push(other),
            None => {}
        }
    }
    unescaped
}

fn decode_unicode(rest: &str) -> Option<char> {
    let hex = rest.get(..4).filter(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))?;
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_mapping_covers_gce_instances() {
        let rules = default_mapping();
        assert_eq!(rules.get("hostname.selector"), Some("networkInterfaces"));
        assert_eq!(rules.get("tag.running.selector"), Some("status=RUNNING"));
        assert_eq!(rules.get("username.default"), Some("rundeck"));
        assert!(rules.syntax_errors().is_empty());
        assert!(rules.tag_set_rule().is_some());
    }

    #[test]
    fn loads_yaml_and_stringifies_scalars() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().expect("temp file");
        writeln!(file, "hostname.selector: hostname\nport.default: 22\nssh.default: true\nempty.default:").expect("write");

        let rules = load_mapping_from_path(file.path()).expect("rules");
        assert_eq!(rules.get("port.default"), Some("22"));
        assert_eq!(rules.get("ssh.default"), Some("true"));
        assert_eq!(rules.get("empty.default"), Some(""));
    }

    #[test]
    fn loads_json_documents() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().expect("temp file");
        write!(file, r#"{{"hostname.selector": "hostname", "role.default": "worker"}}"#).expect("write");

        let rules = load_mapping_from_path(file.path()).expect("rules");
        assert_eq!(rules.get("role.default"), Some("worker"));
    }

    #[test]
    fn rejects_nested_values() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().expect("temp file");
        writeln!(file, "hostname:\n  selector: hostname").expect("write");

        let error = load_mapping_from_path(file.path()).expect_err("nested");
        assert!(matches!(error, MappingConfigError::NotFlat { ref key } if key == "hostname"));
    }

    #[test]
    fn rejects_non_mapping_documents() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().expect("temp file");
        writeln!(file, "- hostname.selector").expect("write");

        let error = load_mapping_from_path(file.path()).expect_err("sequence");
        assert!(matches!(error, MappingConfigError::NotAMapping { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let error = load_mapping_from_path(&dir.path().join("absent.yaml")).expect_err("missing");
        assert!(matches!(error, MappingConfigError::Read { .. }));
    }

    #[test]
    fn parses_properties_files() {
        let content = "# comment\n! also a comment\nhostname.selector=networkInterfaces\n  tag.running.selector = status=RUNNING\ndescription.default: GCE node\nosFamily.default unix\ntags.selector=tags.items,\\\n    name\nflag\n";
        let entries = parse_properties(content);
        assert_eq!(entries["hostname.selector"], "networkInterfaces");
        assert_eq!(entries["tag.running.selector"], "status=RUNNING");
        assert_eq!(entries["description.default"], "GCE node");
        assert_eq!(entries["osFamily.default"], "unix");
        assert_eq!(entries["tags.selector"], "tags.items,name");
        assert_eq!(entries["flag"], "");
        assert_eq!(entries.len(), 6);
    }

    #[test]
    fn properties_escapes_and_continuations() {
        let content = concat!(
            "weird\\=key\\:x = a\\\\b\\u0041\\\n",
            "  continued\n",
            "trail=ends\\\\\n",
            "next=1\n",
            "tabbed\\tkey=x \n",
            "joined=1\\\n",
            "# not a comment\n",
            "bad=\\uZZ12\\uD800\n",
        );
        let entries = parse_properties(content);
        assert_eq!(entries["weird=key:x"], "a\\bAcontinued");
        assert_eq!(entries["trail"], "ends\\");
        assert_eq!(entries["next"], "1");
        assert_eq!(entries["tabbed\tkey"], "x ");
        assert_eq!(entries["joined"], "1# not a comment");
        assert_eq!(entries["bad"], "\\uZZ12\\uD800");
        assert_eq!(entries.len(), 6);
    }

    #[test]
    fn properties_extension_selects_the_properties_parser() {
        let mut file = tempfile::Builder::new().suffix(".properties").tempfile().expect("temp file");
        writeln!(file, "tag.prod.selector=labels.env=production").expect("write");

        let rules = load_mapping_from_path(file.path()).expect("rules");
        assert_eq!(rules.dynamic_tag_rules()[0].expected.as_deref(), Some("production"));
    }

    #[test]
    fn path_resolution_prefers_flag_then_environment() {
        temp_env::with_var(MAPPING_PATH_ENV, Some("/etc/nodemap/env.yaml"), || {
            assert_eq!(mapping_path(Some("/tmp/flag.yaml")), Some(PathBuf::from("/tmp/flag.yaml")));
            assert_eq!(mapping_path(None), Some(PathBuf::from("/etc/nodemap/env.yaml")));
            assert_eq!(mapping_path(Some("  ")), Some(PathBuf::from("/etc/nodemap/env.yaml")));
        });
    }

    #[test]
    fn load_mapping_reports_the_failing_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.yaml");
        let error = load_mapping(path.to_str()).expect_err("missing");
        assert!(format!("{error:#}").contains("absent.yaml"));
    }
}
