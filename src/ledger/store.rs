//! Storage boundary for the traffic ledger
use async_trait::async_trait;
use papaya::HashMap;

use super::TrafficRecord;
use crate::error::{Result, TrafficSyncError};

/// Backing store for per-user traffic counters.
///
/// Implementations must make `inc_used` atomic per user. Any failure other
/// than a missing user should surface as `StorageUnavailable` so the sync
/// path can abort the whole call.
#[async_trait]
pub trait TrafficStore: std::fmt::Debug + Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<TrafficRecord>>;
    async fn insert(&self, record: TrafficRecord) -> Result<()>;
    async fn list(&self) -> Result<Vec<TrafficRecord>>;
    /// Overwrite `total` and/or `used` in one write; `None` keeps the field
    async fn set_traffic(
        &self,
        user_id: &str,
        total: Option<u64>,
        used: Option<u64>,
    ) -> Result<TrafficRecord>;
    async fn inc_used(&self, user_id: &str, delta: i64) -> Result<TrafficRecord>;
}

/// In-process store. Each row is swapped atomically by papaya's `update`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<String, TrafficRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn update_with<F>(&self, user_id: &str, f: F) -> Result<TrafficRecord>
    where
        F: Fn(&TrafficRecord) -> TrafficRecord,
    {
        self.records
            .pin()
            .update(user_id.to_string(), f)
            .cloned()
            .ok_or_else(|| TrafficSyncError::UnknownUser(user_id.to_string()))
    }
}

#[async_trait]
impl TrafficStore for MemoryStore {
    async fn get(&self, user_id: &str) -> Result<Option<TrafficRecord>> {
        Ok(self.records.pin().get(user_id).cloned())
    }

    async fn insert(&self, record: TrafficRecord) -> Result<()> {
        let user_id = record.user_id.clone();
        match self.records.pin().try_insert(user_id.clone(), record) {
            Ok(_) => Ok(()),
            Err(_) => Err(TrafficSyncError::UserExists(user_id)),
        }
    }

    async fn list(&self) -> Result<Vec<TrafficRecord>> {
        let mut records: Vec<TrafficRecord> = self
            .records
            .pin()
            .iter()
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(records)
    }

    async fn set_traffic(
        &self,
        user_id: &str,
        total: Option<u64>,
        used: Option<u64>,
    ) -> Result<TrafficRecord> {
        self.update_with(user_id, |r| TrafficRecord {
            user_id: r.user_id.clone(),
            total: total.unwrap_or(r.total),
            used: used.unwrap_or(r.used),
        })
    }

    async fn inc_used(&self, user_id: &str, delta: i64) -> Result<TrafficRecord> {
        // saturate so a negative delta cannot wrap below zero
        self.update_with(user_id, |r| TrafficRecord {
            used: r.used.saturating_add_signed(delta),
            ..r.clone()
        })
    }
}
