//! Administrative writes that fan out to nodes through the event log
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn, Instrument};

use crate::error::{Result, TrafficSyncError};
use crate::events::{EventBody, EventLog};
use crate::ledger::{TrafficLedger, TrafficRecord};
use crate::nodes::{key_hint, NodeRegistry};

/// Requested quota change; absent fields are left as they are
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrafficChange {
    pub user_id: String,
    #[serde(default)]
    pub total_traffic: Option<u64>,
    #[serde(default)]
    pub used_traffic: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppliedChange {
    pub record: TrafficRecord,
    /// Sequence of the `update_user_traffic` event carrying `record`
    pub sequence: u64,
}

#[derive(Clone, Debug)]
pub struct AdminGateway {
    ledger: TrafficLedger,
    log: Arc<EventLog>,
    nodes: Arc<NodeRegistry>,
    // ledger write and append happen as one step, so log order matches write order
    write_lock: Arc<Mutex<()>>,
}

impl AdminGateway {
    pub fn new(ledger: TrafficLedger, log: Arc<EventLog>, nodes: Arc<NodeRegistry>) -> Self {
        Self {
            ledger,
            log,
            nodes,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Overwrite a user's counters and broadcast the resulting snapshot.
    ///
    /// Exactly one `update_user_traffic` event is appended per call, even when
    /// both fields change. An unknown user appends nothing. The change runs
    /// on its own task so a dropped request cannot separate the ledger write
    /// from its append.
    #[instrument(skip(self), level = "debug")]
    pub async fn apply_admin_traffic_change(&self, change: TrafficChange) -> Result<AppliedChange> {
        let gateway = self.clone();
        tokio::spawn(async move { gateway.apply_serialized(change).await }.in_current_span())
            .await
            .map_err(|e| crate::concurrency_error!("Admin change task failed: {}", e))?
    }

    /// Overwrite the quota alone; broadcasts like any other change
    pub async fn set_total(&self, user_id: &str, value: u64) -> Result<AppliedChange> {
        self.apply_admin_traffic_change(TrafficChange {
            user_id: user_id.to_string(),
            total_traffic: Some(value),
            used_traffic: None,
        })
        .await
    }

    /// Overwrite the usage counter alone; broadcasts like any other change
    pub async fn set_used(&self, user_id: &str, value: u64) -> Result<AppliedChange> {
        self.apply_admin_traffic_change(TrafficChange {
            user_id: user_id.to_string(),
            total_traffic: None,
            used_traffic: Some(value),
        })
        .await
    }

    async fn apply_serialized(&self, change: TrafficChange) -> Result<AppliedChange> {
        let _serial = self.write_lock.lock().await;

        let before = self.ledger.get(&change.user_id).await?;
        let written = self
            .ledger
            .set_traffic(&change.user_id, change.total_traffic, change.used_traffic)
            .await;
        let record = match written {
            Ok(record) => record,
            Err(err @ TrafficSyncError::StorageUnavailable(_)) => {
                self.broadcast_if_committed(&before).await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let sequence = self.broadcast(&record)?;
        info!(
            sequence,
            user_id = %record.user_id,
            total = record.total,
            used = record.used,
            "Queued traffic update"
        );

        Ok(AppliedChange { record, sequence })
    }

    fn broadcast(&self, record: &TrafficRecord) -> Result<u64> {
        self.log.append(EventBody::UpdateUserTraffic {
            user_id: record.user_id.clone(),
            total_traffic: record.total,
            used_traffic: record.used,
        })
    }

    /// A write that failed or timed out may still have landed in the store.
    /// If the record moved, nodes get whatever the ledger now holds.
    async fn broadcast_if_committed(&self, before: &TrafficRecord) {
        match self.ledger.get(&before.user_id).await {
            Ok(current) if current != *before => match self.broadcast(&current) {
                Ok(sequence) => warn!(
                    sequence,
                    user_id = %current.user_id,
                    "Write reported failure but landed; queued its snapshot"
                ),
                Err(err) => error!(
                    user_id = %current.user_id,
                    "Could not queue snapshot of landed write: {}", err
                ),
            },
            Ok(_) => {}
            Err(err) => error!(
                user_id = %before.user_id,
                "Could not read back record after failed write: {}", err
            ),
        }
    }

    /// Create a ledger record for a new user. Nodes hear about the user with
    /// the first admin change to it.
    pub async fn provision_user(&self, record: TrafficRecord) -> Result<TrafficRecord> {
        self.ledger.insert_user(record.clone()).await?;
        info!(user_id = %record.user_id, "Provisioned user");
        Ok(record)
    }

    /// Register a node key; registering a known key is a no-op
    pub fn register_node(&self, key: &str) -> bool {
        let added = self.nodes.register(key);
        if added {
            info!(node = %key_hint(key), "Registered node");
        } else {
            warn!(node = %key_hint(key), "Node already registered");
        }
        added
    }
}
