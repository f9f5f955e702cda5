use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A normalized node derived from exactly one resource record.
///
/// Attributes and tags use ordered collections so two descriptors built from
/// the same input compare and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Unique node name within a [`NodeSet`].
    pub nodename: String,
    /// Address used to reach the node.
    pub hostname: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Flat string attributes. Serialized alongside the fields above, the way
    /// host registries expect node documents to look.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl NodeDescriptor {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Output of one query: descriptors keyed by node name.
///
/// A later descriptor with the same name replaces the earlier one; nothing is
/// merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeSet {
    nodes: IndexMap<String, NodeDescriptor>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor under its own name, returning the one it replaced.
    pub fn put(&mut self, node: NodeDescriptor) -> Option<NodeDescriptor> {
        self.nodes.insert(node.nodename.clone(), node)
    }

    pub fn get(&self, nodename: &str) -> Option<&NodeDescriptor> {
        self.nodes.get(nodename)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.values()
    }
}

impl IntoIterator for NodeSet {
    type Item = NodeDescriptor;
    type IntoIter = indexmap::map::IntoValues<String, NodeDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_values()
    }
}
