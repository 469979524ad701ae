//! The sync protocol: one round trip that carries usage reports up from a
//! node and pending log entries back down to it.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, TrafficSyncError};
use crate::events::{parse_inbound, Event, EventLog};
use crate::ledger::TrafficLedger;
use crate::nodes::{key_hint, NodeRegistry, NodeState};

pub const SYNC_OK_MSG: &str = "OK";

/// Body of `POST /sync`
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SyncRequest {
    pub key: String,
    // kept as raw JSON so one bad entry cannot reject the whole batch
    #[serde(default)]
    pub events: Option<Vec<Value>>,
}

/// Successful `POST /sync` reply
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SyncResponse {
    pub err: i32,
    pub msg: String,
    pub events: Vec<Event>,
}

impl SyncResponse {
    pub fn ok(events: Vec<Event>) -> Self {
        Self {
            err: 0,
            msg: SYNC_OK_MSG.to_string(),
            events,
        }
    }
}

/// Per-entry accounting for one inbound batch
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BatchSummary {
    pub applied: usize,
    pub duplicate: usize,
    pub unknown_user: usize,
    pub unrecognized: usize,
    pub malformed: usize,
}

impl BatchSummary {
    pub fn skipped(&self) -> usize {
        self.duplicate + self.unknown_user + self.unrecognized + self.malformed
    }
}

#[derive(Clone, Debug)]
pub struct SyncOutcome {
    /// Log entries the node had not been sent yet
    pub events: Vec<Event>,
    /// The node's cursor after this call
    pub cursor: u64,
    pub summary: BatchSummary,
}

enum EntryOutcome {
    Applied,
    Duplicate,
}

#[derive(Clone, Debug)]
pub struct SyncCoordinator {
    ledger: TrafficLedger,
    log: Arc<EventLog>,
    nodes: Arc<NodeRegistry>,
}

impl SyncCoordinator {
    pub fn new(ledger: TrafficLedger, log: Arc<EventLog>, nodes: Arc<NodeRegistry>) -> Self {
        Self { ledger, log, nodes }
    }

    /// Apply a node's usage reports, then hand back everything it has not seen.
    ///
    /// Entries are handled one by one: an unknown user, an unknown event type
    /// or a malformed entry is logged and skipped. A storage failure aborts the
    /// call before the cursor moves, so the node can resend the batch.
    #[instrument(skip(self, node_key, inbound), fields(node = %key_hint(node_key), inbound = inbound.len()))]
    pub async fn sync(&self, node_key: &str, inbound: Vec<Value>) -> Result<SyncOutcome> {
        let handle = self.nodes.lookup(node_key).inspect_err(|_| {
            warn!("Rejected sync from unregistered key");
        })?;
        // Same-key syncs queue up here; other nodes are unaffected
        let mut node = handle.lock().await;
        let cursor = node.cursor();
        if !node.is_synchronized() {
            info!("First sync for node, delivering the log from the start");
        }

        if !inbound.is_empty() {
            info!("Received {} events", inbound.len());
        }

        let mut summary = BatchSummary::default();
        for (index, raw) in inbound.into_iter().enumerate() {
            match self.apply_entry(&mut node, raw).await {
                Ok(EntryOutcome::Applied) => summary.applied += 1,
                Ok(EntryOutcome::Duplicate) => {
                    debug!(index, "Skipping already applied report");
                    summary.duplicate += 1;
                }
                Err(TrafficSyncError::UnknownUser(user_id)) => {
                    warn!(index, "User not found: {}", user_id);
                    summary.unknown_user += 1;
                }
                Err(TrafficSyncError::UnrecognizedEventType(kind)) => {
                    warn!(index, "Unknown event type: {}", kind);
                    summary.unrecognized += 1;
                }
                Err(TrafficSyncError::MalformedEvent(msg)) => {
                    warn!(index, "Malformed event: {}", msg);
                    summary.malformed += 1;
                }
                Err(err) => {
                    error!(
                        index,
                        applied = summary.applied,
                        "Aborting sync, cursor left at {}: {}",
                        cursor,
                        err
                    );
                    return Err(err);
                }
            }
        }

        let (events, log_len) = self.log.snapshot_since(cursor)?;
        let advanced = node.advance(log_len);
        debug!(
            from = cursor,
            to = advanced,
            outbound = events.len(),
            applied = summary.applied,
            skipped = summary.skipped(),
            "Sync complete"
        );

        Ok(SyncOutcome {
            events,
            cursor: advanced,
            summary,
        })
    }

    async fn apply_entry(&self, node: &mut NodeState, raw: Value) -> Result<EntryOutcome> {
        let report = parse_inbound(raw)?;
        if let Some(report_id) = &report.report_id {
            if node.recent_reports.contains(report_id) {
                return Ok(EntryOutcome::Duplicate);
            }
        }

        self.ledger.inc_used(&report.user_id, report.dt).await?;

        // Only remember ids whose delta actually landed
        if let Some(report_id) = report.report_id {
            node.recent_reports.remember(report_id);
        }
        Ok(EntryOutcome::Applied)
    }
}
