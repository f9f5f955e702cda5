//! Node assembly: one resource record plus a rule set becomes at most one node.
//!
//! Passes run in a fixed order over a single [`NodeDraft`]:
//!
//! 1. tag set (merge mode) plus the scope id as a tag
//! 2. dynamic tags
//! 3. default-only attributes, each also setting `projectId`
//! 4. selector attributes, overwriting step 3
//! 5. hostname, dropping the record when none was produced
//! 6. node name: `nodename` attribute, then hostname, then record id
//!
//! Tags only ever accumulate; attributes set by a later pass replace earlier
//! values.

use std::collections::{BTreeMap, BTreeSet};

use nodemap_types::NodeDescriptor;
use tracing::debug;

use crate::error::MappingError;
use crate::field::FieldAccessor;
use crate::rules::{MappingRuleSet, TAGS_SELECTOR_KEY};

/// Attribute carrying the scope identifier.
pub const SCOPE_ATTRIBUTE: &str = "projectId";
/// Attribute lifted into [`NodeDescriptor::hostname`].
pub const HOSTNAME_ATTRIBUTE: &str = "hostname";
/// Attribute lifted into [`NodeDescriptor::nodename`].
pub const NODENAME_ATTRIBUTE: &str = "nodename";

/// Attributes and tags accumulated across the assembly passes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeDraft {
    pub attributes: BTreeMap<String, String>,
    pub tags: BTreeSet<String>,
}

impl NodeDraft {
    fn add_tags(&mut self, joined: &str) {
        self.tags
            .extend(joined.split(',').map(str::trim).filter(|tag| !tag.is_empty()).map(str::to_string));
    }

    fn add_tag(&mut self, tag: &str) {
        if !tag.is_empty() {
            self.tags.insert(tag.to_string());
        }
    }

    /// Finish the draft, or `None` when no hostname attribute was produced.
    fn into_descriptor(mut self, record_id: &str) -> Option<NodeDescriptor> {
        let hostname = self.attributes.remove(HOSTNAME_ATTRIBUTE)?;
        let nodename = self
            .attributes
            .remove(NODENAME_ATTRIBUTE)
            .filter(|name| !name.is_empty())
            .or_else(|| Some(hostname.clone()).filter(|name| !name.is_empty()))
            .unwrap_or_else(|| record_id.to_string());
        Some(NodeDescriptor {
            nodename,
            hostname,
            tags: self.tags,
            attributes: self.attributes,
        })
    }
}

/// Build the descriptor for `record` under `scope_id`.
///
/// Returns `Ok(None)` for records without a hostname. Only a malformed
/// attribute or tag-set selector fails the record; a malformed dynamic tag
/// selector skips that tag.
pub fn assemble<A: FieldAccessor + ?Sized>(
    record: &A,
    rules: &MappingRuleSet,
    scope_id: &str,
) -> Result<Option<NodeDescriptor>, MappingError> {
    let mut draft = NodeDraft::default();
    apply_tag_set(&mut draft, record, rules, scope_id)?;
    apply_dynamic_tags(&mut draft, record, rules);
    apply_attribute_defaults(&mut draft, rules, scope_id);
    apply_attribute_selectors(&mut draft, record, rules)?;

    let descriptor = draft.into_descriptor(record.record_id());
    if descriptor.is_none() {
        debug!(record_id = %record.record_id(), "dropping record without hostname");
    }
    Ok(descriptor)
}

fn apply_tag_set<A: FieldAccessor + ?Sized>(
    draft: &mut NodeDraft,
    record: &A,
    rules: &MappingRuleSet,
    scope_id: &str,
) -> Result<(), MappingError> {
    if let Some(rule) = rules.tag_set_rule() {
        let value = rule
            .selector
            .evaluate(record, rule.default.as_deref())
            .map_err(|source| MappingError {
                record_id: record.record_id().to_string(),
                rule: TAGS_SELECTOR_KEY.to_string(),
                source,
            })?;
        if let Some(value) = value {
            draft.add_tags(&value);
        }
    }
    draft.add_tag(scope_id);
    Ok(())
}

fn apply_dynamic_tags<A: FieldAccessor + ?Sized>(draft: &mut NodeDraft, record: &A, rules: &MappingRuleSet) {
    for rule in rules.dynamic_tag_rules() {
        match rule.selector.evaluate(record, None) {
            Ok(value) if rule.matches(value.as_deref()) => draft.add_tag(&rule.tag),
            Ok(_) => {}
            Err(error) => {
                debug!(record_id = %record.record_id(), rule = %rule.key, error = %error, "skipping tag rule");
            }
        }
    }
}

fn apply_attribute_defaults(draft: &mut NodeDraft, rules: &MappingRuleSet, scope_id: &str) {
    for rule in rules.attribute_default_rules() {
        draft.attributes.insert(rule.attribute.clone(), rule.value.clone());
        draft.attributes.insert(SCOPE_ATTRIBUTE.to_string(), scope_id.to_string());
    }
}

fn apply_attribute_selectors<A: FieldAccessor + ?Sized>(
    draft: &mut NodeDraft,
    record: &A,
    rules: &MappingRuleSet,
) -> Result<(), MappingError> {
    for rule in rules.attribute_selector_rules() {
        let value = rule
            .selector
            .evaluate(record, rule.default.as_deref())
            .map_err(|source| MappingError {
                record_id: record.record_id().to_string(),
                rule: rule.key.clone(),
                source,
            })?;
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            draft.attributes.insert(rule.attribute.clone(), value);
        }
    }
    Ok(())
}
