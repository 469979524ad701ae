use std::sync::Arc;

use tracing::{info, warn};

use crate::admin::AdminGateway;
use crate::error::{Result, TrafficSyncError};
use crate::events::EventLog;
use crate::ledger::{MemoryStore, TrafficLedger, TrafficStore};
use crate::nodes::NodeRegistry;
use crate::settings::{SeedData, Settings};
use crate::sync::SyncCoordinator;

/// Everything a request handler needs, cheap to clone into axum state
#[derive(Clone, Debug)]
pub struct Authority {
    pub settings: Settings,
    pub ledger: TrafficLedger,
    pub log: Arc<EventLog>,
    pub nodes: Arc<NodeRegistry>,
    pub coordinator: SyncCoordinator,
    pub admin: AdminGateway,
}

impl Authority {
    pub fn new(settings: Settings, store: Arc<dyn TrafficStore>) -> Self {
        let ledger = TrafficLedger::new(store, settings.store_timeout());
        let log = Arc::new(EventLog::new());
        let nodes = Arc::new(NodeRegistry::new(settings.report_dedupe_window));
        let coordinator = SyncCoordinator::new(ledger.clone(), log.clone(), nodes.clone());
        let admin = AdminGateway::new(ledger.clone(), log.clone(), nodes.clone());
        Self {
            settings,
            ledger,
            log,
            nodes,
            coordinator,
            admin,
        }
    }

    /// In-memory authority populated from the configured seed
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let seed = settings.load_seed()?;
        let authority = Self::new(settings, Arc::new(MemoryStore::new()));
        authority.seed(seed).await?;
        Ok(authority)
    }

    pub async fn seed(&self, seed: SeedData) -> Result<()> {
        let user_count = seed.users.len();
        for record in seed.users {
            match self.ledger.insert_user(record).await {
                Ok(()) => {}
                Err(TrafficSyncError::UserExists(user_id)) => {
                    warn!("Seed lists user {} more than once", user_id);
                }
                Err(err) => return Err(err),
            }
        }
        for key in &seed.nodes {
            self.nodes.register(key);
        }
        info!(
            "Loaded {} users and {} nodes",
            user_count,
            self.nodes.len()
        );
        Ok(())
    }
}
