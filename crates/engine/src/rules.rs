//! Compiled view over a flat mapping configuration.
//!
//! Rules are discovered by matching configuration keys against fixed patterns:
//!
//! | Key | Rule |
//! |---|---|
//! | `<attr>.selector` | attribute from a selector, `<attr>.default` as fallback |
//! | `<attr>.default` | literal attribute, only when `<attr>.selector` is absent or empty |
//! | `tags.selector` / `tags.default` | comma-separated tag set, merge mode |
//! | `tag.<name>.selector` | add tag `<name>` when `selector[=expected]` matches |
//!
//! Any other key is ignored. The `tags` attribute name belongs to the tag-set
//! rule and never produces an attribute.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ResolutionError;
use crate::selector::{Selector, SelectorMode};

pub const TAGS_SELECTOR_KEY: &str = "tags.selector";
pub const TAGS_DEFAULT_KEY: &str = "tags.default";
const TAGS_ATTRIBUTE: &str = "tags";

static ATTRIBUTE_DEFAULT_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^.]+)\.default$").expect("valid attribute default pattern"));
static ATTRIBUTE_SELECTOR_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^.]+)\.selector$").expect("valid attribute selector pattern"));
static DYNAMIC_TAG_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^tag\.(.+)\.selector$").expect("valid tag selector pattern"));

/// `<attr>.default` with no usable `<attr>.selector`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDefaultRule {
    pub attribute: String,
    pub value: String,
}

/// `<attr>.selector`, paired with `<attr>.default` when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelectorRule {
    pub attribute: String,
    pub key: String,
    pub selector: Selector,
    pub default: Option<String>,
}

/// `tag.<name>.selector = <selector>[=<expected>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicTagRule {
    pub tag: String,
    pub key: String,
    pub selector: Selector,
    pub expected: Option<String>,
}

impl DynamicTagRule {
    /// Whether a resolved value earns the tag.
    pub fn matches(&self, value: Option<&str>) -> bool {
        match (value, self.expected.as_deref()) {
            (None, _) => false,
            (Some(value), _) if value.is_empty() => false,
            (Some(_), None) => true,
            (Some(value), Some(expected)) => value == expected,
        }
    }
}

/// `tags.selector` / `tags.default`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSetRule {
    pub selector: Selector,
    pub default: Option<String>,
}

/// Rule table compiled from a flat key/value configuration.
///
/// Read-only once built; swap the whole set to change behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingRuleSet {
    entries: BTreeMap<String, String>,
    tag_set: Option<TagSetRule>,
    attribute_defaults: Vec<AttributeDefaultRule>,
    attribute_selectors: Vec<AttributeSelectorRule>,
    dynamic_tags: Vec<DynamicTagRule>,
}

impl MappingRuleSet {
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let entries: BTreeMap<String, String> = entries.into_iter().map(|(key, value)| (key.into(), value.into())).collect();
        Self {
            tag_set: compile_tag_set(&entries),
            attribute_defaults: compile_attribute_defaults(&entries),
            attribute_selectors: compile_attribute_selectors(&entries),
            dynamic_tags: compile_dynamic_tags(&entries),
            entries,
        }
    }

    /// Raw configuration value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tag_set_rule(&self) -> Option<&TagSetRule> {
        self.tag_set.as_ref()
    }

    pub fn attribute_default_rules(&self) -> &[AttributeDefaultRule] {
        &self.attribute_defaults
    }

    pub fn attribute_selector_rules(&self) -> &[AttributeSelectorRule] {
        &self.attribute_selectors
    }

    pub fn dynamic_tag_rules(&self) -> &[DynamicTagRule] {
        &self.dynamic_tags
    }

    /// Selector syntax errors, keyed by configuration key.
    pub fn syntax_errors(&self) -> Vec<(&str, &ResolutionError)> {
        let tag_set = self
            .tag_set
            .iter()
            .filter_map(|rule| rule.selector.syntax_error().map(|error| (TAGS_SELECTOR_KEY, error)));
        let attributes = self
            .attribute_selectors
            .iter()
            .filter_map(|rule| rule.selector.syntax_error().map(|error| (rule.key.as_str(), error)));
        let tags = self
            .dynamic_tags
            .iter()
            .filter_map(|rule| rule.selector.syntax_error().map(|error| (rule.key.as_str(), error)));
        tag_set.chain(attributes).chain(tags).collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MappingRuleSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_entries(iter)
    }
}

fn compile_tag_set(entries: &BTreeMap<String, String>) -> Option<TagSetRule> {
    let selector = entries.get(TAGS_SELECTOR_KEY)?;
    Some(TagSetRule {
        selector: Selector::compile(selector, SelectorMode::Merge),
        default: entries.get(TAGS_DEFAULT_KEY).cloned(),
    })
}

fn compile_attribute_defaults(entries: &BTreeMap<String, String>) -> Vec<AttributeDefaultRule> {
    entries
        .iter()
        .filter_map(|(key, value)| {
            let attribute = ATTRIBUTE_DEFAULT_KEY.captures(key)?.get(1)?.as_str();
            if attribute == TAGS_ATTRIBUTE {
                return None;
            }
            let has_selector = entries
                .get(&format!("{attribute}.selector"))
                .is_some_and(|selector| !selector.is_empty());
            (!has_selector).then(|| AttributeDefaultRule {
                attribute: attribute.to_string(),
                value: value.clone(),
            })
        })
        .collect()
}

fn compile_attribute_selectors(entries: &BTreeMap<String, String>) -> Vec<AttributeSelectorRule> {
    entries
        .iter()
        .filter_map(|(key, value)| {
            let attribute = ATTRIBUTE_SELECTOR_KEY.captures(key)?.get(1)?.as_str();
            if attribute == TAGS_ATTRIBUTE {
                return None;
            }
            Some(AttributeSelectorRule {
                attribute: attribute.to_string(),
                key: key.clone(),
                selector: Selector::compile(value, SelectorMode::Single),
                default: entries.get(&format!("{attribute}.default")).cloned(),
            })
        })
        .collect()
}

fn compile_dynamic_tags(entries: &BTreeMap<String, String>) -> Vec<DynamicTagRule> {
    entries
        .iter()
        .filter_map(|(key, value)| {
            let tag = DYNAMIC_TAG_KEY.captures(key)?.get(1)?.as_str();
            let (selector, expected) = match value.split_once('=') {
                Some((selector, expected)) => (selector, Some(expected.to_string()).filter(|expected| !expected.is_empty())),
                None => (value.as_str(), None),
            };
            Some(DynamicTagRule {
                tag: tag.to_string(),
                key: key.clone(),
                selector: Selector::compile(selector, SelectorMode::Single),
                expected,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(entries: &[(&str, &str)]) -> MappingRuleSet {
        entries.iter().copied().collect()
    }

    #[test]
    fn default_is_skipped_when_a_selector_exists() {
        let rules = rules(&[("name.selector", "name"), ("name.default", "v2"), ("role.default", "worker")]);

        let defaults: Vec<_> = rules.attribute_default_rules().iter().map(|r| r.attribute.as_str()).collect();
        assert_eq!(defaults, vec!["role"]);

        let selectors = rules.attribute_selector_rules();
        assert_eq!(selectors.len(), 1);
        assert_eq!(selectors[0].attribute, "name");
        assert_eq!(selectors[0].default.as_deref(), Some("v2"));
    }

    #[test]
    fn empty_selector_does_not_suppress_default() {
        let rules = rules(&[("name.selector", ""), ("name.default", "v3")]);
        assert_eq!(rules.attribute_default_rules().len(), 1);
        assert_eq!(rules.attribute_selector_rules().len(), 1);
        assert!(rules.attribute_selector_rules()[0].selector.is_empty());
    }

    #[test]
    fn tags_keys_only_feed_the_tag_set_rule() {
        let rules = rules(&[("tags.selector", "tags.items|labels.role"), ("tags.default", "untagged")]);
        assert!(rules.attribute_default_rules().is_empty());
        assert!(rules.attribute_selector_rules().is_empty());
        let tag_set = rules.tag_set_rule().expect("tag set rule");
        assert_eq!(tag_set.selector.mode(), SelectorMode::Merge);
        assert_eq!(tag_set.default.as_deref(), Some("untagged"));
    }

    #[test]
    fn dynamic_tag_values_split_on_first_equals() {
        let rules = rules(&[
            ("tag.prod.selector", "labels.env=production"),
            ("tag.any.selector", "labels.env"),
            ("tag.odd.selector", "metadata.kv=a=b"),
            ("tag.blank.selector", "status="),
        ]);
        let by_tag: BTreeMap<_, _> = rules.dynamic_tag_rules().iter().map(|r| (r.tag.as_str(), r)).collect();

        assert_eq!(by_tag["prod"].selector.as_str(), "labels.env");
        assert_eq!(by_tag["prod"].expected.as_deref(), Some("production"));
        assert_eq!(by_tag["any"].expected, None);
        assert_eq!(by_tag["odd"].expected.as_deref(), Some("a=b"));
        assert_eq!(by_tag["blank"].expected, None);
    }

    #[test]
    fn dynamic_tag_matching() {
        let rule = rules(&[("tag.prod.selector", "env=production")]).dynamic_tag_rules()[0].clone();
        assert!(rule.matches(Some("production")));
        assert!(!rule.matches(Some("staging")));
        assert!(!rule.matches(Some("")));
        assert!(!rule.matches(None));
    }

    #[test]
    fn unrecognized_keys_are_ignored() {
        let rules = rules(&[("project", "demo"), ("a.b.selector", "x"), ("selector", "y")]);
        assert!(rules.attribute_default_rules().is_empty());
        assert!(rules.attribute_selector_rules().is_empty());
        assert!(rules.dynamic_tag_rules().is_empty());
        assert!(rules.tag_set_rule().is_none());
        assert_eq!(rules.get("project"), Some("demo"));
    }

    #[test]
    fn tag_without_a_name_is_an_attribute_named_tag() {
        let rules = rules(&[("tag.selector", "z")]);
        assert!(rules.dynamic_tag_rules().is_empty());
        assert!(rules.tag_set_rule().is_none());

        let selectors = rules.attribute_selector_rules();
        assert_eq!(selectors.len(), 1);
        assert_eq!(selectors[0].attribute, "tag");
        assert_eq!(selectors[0].key, "tag.selector");
    }

    #[test]
    fn reports_selector_syntax_errors_by_key() {
        let rules = rules(&[("hostname.selector", "a..b"), ("tag.x.selector", "labels(env=1"), ("zone.selector", "zone")]);
        let keys: Vec<_> = rules.syntax_errors().into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["hostname.selector", "tag.x.selector"]);
    }
}
