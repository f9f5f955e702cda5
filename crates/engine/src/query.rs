//! Query orchestration: collect one scope, assemble every record, gather the
//! nodes.
//!
//! Failures below this layer never fail a query. A record that cannot be
//! mapped is logged and skipped; a scope that cannot be listed contributes no
//! records. The only errors a caller sees come from the asynchronous handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread;

use nodemap_api::InventoryClient;
use nodemap_types::{NodeSet, RecordSet};
use nodemap_util::block_on_future;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::assemble::assemble;
use crate::error::{CollectionWarning, QueryError};
use crate::inventory::{InventoryQuery, report_warning, try_collect_records};
use crate::rules::MappingRuleSet;

const RUNNING: u8 = 0;
const COMPLETED: u8 = 1;
const CANCELLED: u8 = 2;

/// Drives collection and assembly for one inventory scope.
///
/// Cheap to clone; clones share the client and the current rule set.
#[derive(Clone)]
pub struct QueryOrchestrator {
    client: Arc<dyn InventoryClient>,
    rules: Arc<MappingRuleSet>,
    query: InventoryQuery,
}

impl QueryOrchestrator {
    pub fn new(client: Arc<dyn InventoryClient>, rules: MappingRuleSet, query: InventoryQuery) -> Self {
        report_syntax_errors(&rules);
        Self {
            client,
            rules: Arc::new(rules),
            query,
        }
    }

    pub fn rules(&self) -> &MappingRuleSet {
        &self.rules
    }

    pub fn query(&self) -> &InventoryQuery {
        &self.query
    }

    /// Swap the rule set used by subsequent queries.
    ///
    /// Queries already spawned keep the rule set they started with.
    pub fn replace_rules(&mut self, rules: MappingRuleSet) {
        report_syntax_errors(&rules);
        self.rules = Arc::new(rules);
    }

    /// Collect and assemble, returning whatever could be mapped.
    pub async fn execute(&self) -> NodeSet {
        match self.execute_until(&CancellationToken::new()).await {
            Ok(nodes) => nodes,
            // The token above is never cancelled.
            Err(_) => NodeSet::new(),
        }
    }

    /// Blocking variant of [`execute`](Self::execute).
    ///
    /// Fails only when no async runtime can be provided for the call.
    pub fn run(&self) -> Result<NodeSet, QueryError> {
        let orchestrator = self.clone();
        Ok(block_on_future(async move { orchestrator.execute().await })?)
    }

    /// Start the query in the background.
    ///
    /// Runs on the current Tokio runtime when it is multi-threaded. Otherwise
    /// the query gets a helper thread with its own runtime, so a blocking
    /// [`QueryHandle::wait_blocking`] cannot starve it.
    pub fn spawn(&self) -> QueryHandle {
        let cancel = CancellationToken::new();
        let state = Arc::new(AtomicU8::new(RUNNING));
        let finished = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = oneshot::channel();

        let orchestrator = self.clone();
        let task = {
            let cancel = cancel.clone();
            let state = Arc::clone(&state);
            let finished = Arc::clone(&finished);
            async move {
                let mut result = orchestrator.execute_until(&cancel).await;
                if state
                    .compare_exchange(RUNNING, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    result = Err(QueryError::Cancelled);
                }
                let _ = sender.send(result);
                finished.store(true, Ordering::Release);
            }
        };

        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                handle.spawn(task);
            }
            _ => {
                thread::spawn(move || {
                    if let Err(err) = block_on_future(task) {
                        error!(error = %err, "query runtime failed to start");
                    }
                });
            }
        }

        QueryHandle {
            cancel,
            state,
            finished,
            receiver,
        }
    }

    async fn execute_until(&self, cancel: &CancellationToken) -> Result<NodeSet, QueryError> {
        let records = match try_collect_records(self.client.as_ref(), &self.query, cancel).await {
            Ok(records) => records,
            Err(CollectionWarning::Cancelled { .. }) => return Err(QueryError::Cancelled),
            Err(warning) => {
                report_warning(&warning);
                RecordSet::new()
            }
        };
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        Ok(assemble_nodes(records, &self.rules, &self.query.scope))
    }
}

/// Handle to a query started with [`QueryOrchestrator::spawn`].
#[derive(Debug)]
pub struct QueryHandle {
    cancel: CancellationToken,
    state: Arc<AtomicU8>,
    finished: Arc<AtomicBool>,
    receiver: oneshot::Receiver<Result<NodeSet, QueryError>>,
}

impl QueryHandle {
    /// Request cancellation. An in-flight page fetch is abandoned and the
    /// query resolves to [`QueryError::Cancelled`].
    ///
    /// Returns `true` exactly when [`wait`](Self::wait) will yield
    /// [`QueryError::Cancelled`]. Returns `false` when the query had already
    /// produced its result, which is then kept.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel();
        match self
            .state
            .compare_exchange(RUNNING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(current) => current == CANCELLED,
        }
    }

    /// Token that cancels this query when triggered, for use from another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once the result has been handed to this handle.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Wait for the query to complete.
    pub async fn wait(self) -> Result<NodeSet, QueryError> {
        self.receiver.await.map_err(|_| QueryError::Aborted)?
    }

    /// Blocking variant of [`wait`](Self::wait).
    pub fn wait_blocking(self) -> Result<NodeSet, QueryError> {
        block_on_future(self.wait())?
    }
}

/// Assemble `records` in order; later nodes replace earlier ones of the same name.
pub fn assemble_nodes(records: RecordSet, rules: &MappingRuleSet, scope_id: &str) -> NodeSet {
    let mut nodes = NodeSet::new();
    let mut dropped = 0usize;
    let mut failed = 0usize;
    for record in records {
        match assemble(&record, rules, scope_id) {
            Ok(Some(node)) => {
                if let Some(replaced) = nodes.put(node) {
                    debug!(nodename = %replaced.nodename, record_id = %record.id(), "node replaced by a later record");
                }
            }
            Ok(None) => dropped += 1,
            Err(err) => {
                failed += 1;
                warn!(record_id = %err.record_id, rule = %err.rule, error = %err.source, "failed to map record");
            }
        }
    }
    info!(scope = %scope_id, nodes = nodes.len(), dropped, failed, "assembled nodes");
    nodes
}

fn report_syntax_errors(rules: &MappingRuleSet) {
    for (key, err) in rules.syntax_errors() {
        warn!(rule = %key, error = %err, "mapping rule has a malformed selector");
    }
}
