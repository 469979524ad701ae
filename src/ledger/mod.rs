//! Per-user traffic accounting.
//!
//! The ledger is the authority's source of quota truth. Quota is advisory:
//! `used` may exceed `total`, nothing here rejects a write for that reason.
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time;
use tracing::debug;

pub mod store;

use crate::error::{Result, TrafficSyncError};
pub use store::{MemoryStore, TrafficStore};

/// Traffic counters for one user, in bytes
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrafficRecord {
    pub user_id: String,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub used: u64,
}

impl TrafficRecord {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            total: 0,
            used: 0,
        }
    }
}

/// Ledger over a `TrafficStore`; every store call is bounded by `store_timeout`
#[derive(Clone, Debug)]
pub struct TrafficLedger {
    store: Arc<dyn TrafficStore>,
    store_timeout: Duration,
}

impl TrafficLedger {
    pub fn new(store: Arc<dyn TrafficStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    pub async fn get(&self, user_id: &str) -> Result<TrafficRecord> {
        time::timeout(self.store_timeout, self.store.get(user_id))
            .await??
            .ok_or_else(|| TrafficSyncError::UnknownUser(user_id.to_string()))
    }

    pub async fn insert_user(&self, record: TrafficRecord) -> Result<()> {
        debug!("Provisioning ledger record for {}", record.user_id);
        time::timeout(self.store_timeout, self.store.insert(record)).await?
    }

    pub async fn list(&self) -> Result<Vec<TrafficRecord>> {
        time::timeout(self.store_timeout, self.store.list()).await?
    }

    /// Overwrite quota and/or usage as a single write; last write wins
    pub async fn set_traffic(
        &self,
        user_id: &str,
        total: Option<u64>,
        used: Option<u64>,
    ) -> Result<TrafficRecord> {
        time::timeout(self.store_timeout, self.store.set_traffic(user_id, total, used)).await?
    }

    /// Add a node-reported delta to `used`
    pub async fn inc_used(&self, user_id: &str, delta: i64) -> Result<TrafficRecord> {
        time::timeout(self.store_timeout, self.store.inc_used(user_id, delta)).await?
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    fn ledger() -> TrafficLedger {
        TrafficLedger::new(Arc::new(MemoryStore::new()), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn admin_overwrites_are_last_write_wins() {
        let ledger = ledger();
        ledger.insert_user(TrafficRecord::new("u1")).await.unwrap();

        ledger.set_traffic("u1", Some(1000), None).await.unwrap();
        let record = ledger
            .set_traffic("u1", Some(1_073_741_824), None)
            .await
            .unwrap();
        assert_eq!(record.total, 1_073_741_824);

        ledger.set_traffic("u1", None, Some(500)).await.unwrap();
        let record = ledger.set_traffic("u1", None, Some(7)).await.unwrap();
        assert_eq!(record.used, 7);
        assert_eq!(record.total, 1_073_741_824);
        assert_eq!(ledger.get("u1").await.unwrap(), record);
    }

    #[tokio::test]
    async fn usage_is_not_capped_by_quota() {
        let ledger = ledger();
        ledger
            .insert_user(TrafficRecord {
                user_id: "u1".into(),
                total: 10,
                used: 0,
            })
            .await
            .unwrap();
        let record = ledger.inc_used("u1", 100).await.unwrap();
        assert_eq!(record.used, 100);
        assert_eq!(record.total, 10);
    }

    #[tokio::test]
    async fn unknown_user_is_reported() {
        let ledger = ledger();
        assert!(matches!(
            ledger.get("ghost").await,
            Err(TrafficSyncError::UnknownUser(_))
        ));
        assert!(matches!(
            ledger.set_traffic("ghost", None, Some(1)).await,
            Err(TrafficSyncError::UnknownUser(_))
        ));
    }

    #[derive(Debug)]
    struct StalledStore;

    #[async_trait]
    impl TrafficStore for StalledStore {
        async fn get(&self, _: &str) -> Result<Option<TrafficRecord>> {
            std::future::pending().await
        }
        async fn insert(&self, _: TrafficRecord) -> Result<()> {
            std::future::pending().await
        }
        async fn list(&self) -> Result<Vec<TrafficRecord>> {
            std::future::pending().await
        }
        async fn set_traffic(
            &self,
            _: &str,
            _: Option<u64>,
            _: Option<u64>,
        ) -> Result<TrafficRecord> {
            std::future::pending().await
        }
        async fn inc_used(&self, _: &str, _: i64) -> Result<TrafficRecord> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_store_becomes_storage_unavailable() {
        let ledger = TrafficLedger::new(Arc::new(StalledStore), Duration::from_millis(20));
        let err = ledger.inc_used("u1", 1).await.unwrap_err();
        assert!(matches!(err, TrafficSyncError::StorageUnavailable(_)));
        assert!(err.is_retryable());
    }
}
