//! Wire models for the aggregated instance listing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters for one page of an aggregated listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedListRequest {
    /// Inventory scope (project id).
    pub project: String,
    /// Provider-side filter expression.
    pub filter: Option<String>,
    pub page_token: Option<String>,
    pub max_results: Option<u32>,
}

impl AggregatedListRequest {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    /// Copy of this request pointing at the page identified by `token`.
    pub fn with_page_token(&self, token: Option<String>) -> Self {
        Self {
            page_token: token,
            ..self.clone()
        }
    }
}

/// One page of an aggregated listing: instances grouped by sub-scope (zone).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedInstanceList {
    /// Absent when the scope holds no instances at all.
    #[serde(default)]
    pub items: Option<IndexMap<String, InstancesScopedList>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    /// Sub-scopes the provider could not reach for this page.
    #[serde(default)]
    pub unreachables: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstancesScopedList {
    #[serde(default)]
    pub instances: Option<Vec<Value>>,
    #[serde(default)]
    pub warning: Option<ListWarning>,
}

/// Informational notice attached to a sub-scope, e.g. `NO_RESULTS_ON_PAGE`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListWarning {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
