//! Inventory collection for one scope.
//!
//! Follows the paginated, zone-aggregated listing until the provider stops
//! returning page tokens, flattening every zone's instances into one
//! [`RecordSet`] deduplicated by record id.

use indexmap::IndexMap;
use nodemap_api::{AggregatedListRequest, InstancesScopedList, InventoryClient};
use nodemap_types::{RecordSet, ResourceRecord};
use nodemap_util::redact_sensitive;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CollectionWarning;

const STATUS_PROPERTY: &str = "status";
const RUNNING_STATUS: &str = "RUNNING";

/// What to list and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryQuery {
    /// Scope identifier (project id); also injected into every node.
    pub scope: String,
    /// `key=value` filters, ANDed into the provider filter expression.
    pub filters: Vec<String>,
    /// Skip records whose status is present and not `RUNNING`.
    pub running_only: bool,
    /// Provider page size.
    pub page_size: Option<u32>,
}

impl InventoryQuery {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            filters: Vec::new(),
            running_only: true,
            page_size: None,
        }
    }

    /// Provider filter expression, e.g. `(labels.env = "prod") (zone = "us-east1-b")`.
    ///
    /// Entries without `=` are passed through as raw clauses.
    pub fn filter_expression(&self) -> Option<String> {
        let clauses: Vec<String> = self
            .filters
            .iter()
            .map(|filter| filter.trim())
            .filter(|filter| !filter.is_empty())
            .map(|filter| match filter.split_once('=') {
                Some((key, value)) => format!("({} = \"{}\")", key.trim(), value.trim().replace('"', "\\\"")),
                None => format!("({filter})"),
            })
            .collect();
        (!clauses.is_empty()).then(|| clauses.join(" "))
    }

    fn first_page(&self) -> AggregatedListRequest {
        AggregatedListRequest {
            filter: self.filter_expression(),
            max_results: self.page_size,
            ..AggregatedListRequest::new(&self.scope)
        }
    }

    fn admits(&self, record: &ResourceRecord) -> bool {
        if !self.running_only {
            return true;
        }
        match record.property(STATUS_PROPERTY).and_then(Value::as_str) {
            Some(status) => status == RUNNING_STATUS,
            None => true,
        }
    }
}

/// Collect every record in `query.scope`, stopping early if `cancel` fires.
///
/// Any failure abandons the scope; callers decide whether that is fatal.
pub async fn try_collect_records(
    client: &dyn InventoryClient,
    query: &InventoryQuery,
    cancel: &CancellationToken,
) -> Result<RecordSet, CollectionWarning> {
    info!(scope = %query.scope, "collecting inventory");
    let mut records = RecordSet::new();
    let mut request = query.first_page();
    let mut pages = 0usize;

    loop {
        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(CollectionWarning::Cancelled { scope: query.scope.clone() });
            }
            page = client.aggregated_instances(&request) => page.map_err(|source| CollectionWarning::Api {
                scope: query.scope.clone(),
                source,
            })?,
        };
        pages += 1;
        debug!(scope = %query.scope, page = pages, zones = page.items.as_ref().map_or(0, IndexMap::len), "fetched inventory page");

        for unreachable in &page.unreachables {
            warn!(scope = %query.scope, zone = %unreachable, "zone unreachable during inventory listing");
        }
        if let Some(items) = page.items {
            absorb_zones(&mut records, items, query);
        }

        match page.next_page_token.filter(|token| !token.is_empty()) {
            None => break,
            Some(token) if request.page_token.as_deref() == Some(token.as_str()) => {
                return Err(CollectionWarning::RepeatedPageToken {
                    scope: query.scope.clone(),
                    token,
                });
            }
            Some(token) => request = request.with_page_token(Some(token)),
        }
    }

    if records.is_empty() {
        warn!(scope = %query.scope, "inventory listing is empty");
    }
    info!(scope = %query.scope, records = records.len(), pages, "collected inventory");
    Ok(records)
}

/// Collect every record in `query.scope`; a failed listing yields an empty set.
pub async fn collect_records(client: &dyn InventoryClient, query: &InventoryQuery) -> RecordSet {
    match try_collect_records(client, query, &CancellationToken::new()).await {
        Ok(records) => records,
        Err(warning) => {
            report_warning(&warning);
            RecordSet::new()
        }
    }
}

/// Log a collection warning with secrets stripped.
pub fn report_warning(warning: &CollectionWarning) {
    warn!(error = %redact_sensitive(&warning.to_string()), "inventory collection abandoned");
}

fn absorb_zones(records: &mut RecordSet, zones: IndexMap<String, InstancesScopedList>, query: &InventoryQuery) {
    for (zone, list) in zones {
        if let Some(notice) = &list.warning {
            debug!(scope = %query.scope, zone = %zone, code = %notice.code, message = %notice.message, "zone listing notice");
        }
        for body in list.instances.unwrap_or_default() {
            let record = match ResourceRecord::from_value(body) {
                Ok(record) => record,
                Err(error) => {
                    warn!(scope = %query.scope, zone = %zone, error = %error, "skipping malformed inventory record");
                    continue;
                }
            };
            if !query.admits(&record) {
                debug!(record_id = %record.id(), "skipping record that is not running");
                continue;
            }
            let id = record.id().to_string();
            if !records.insert(record) {
                debug!(record_id = %id, zone = %zone, "duplicate record ignored");
            }
        }
    }
}
