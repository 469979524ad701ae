//! trafficsync application settings
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ledger::TrafficRecord;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";
pub const STANDARD_PORT_HTTP: u16 = 8420;
pub const DEFAULT_PORT_HTTP: &str = "8420";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: &str = "10";
pub const DEFAULT_STORE_TIMEOUT_MS: &str = "2000";
pub const DEFAULT_REPORT_DEDUPE_WINDOW: &str = "1024";
pub const DEFAULT_MAX_BODY_BYTES: &str = "1048576";

#[derive(Clone, Debug)]
pub struct Settings {
    // Server listen address
    pub listen_address: String,

    // HTTP API listen port
    pub listen_port: u16,

    // Keys of nodes allowed to sync
    pub node_keys: Vec<String>,

    // Optional JSON file with users and nodes to load at startup
    pub seed_file: Option<PathBuf>,

    // Bearer token for /admin routes; admin routes reject everything when unset
    pub admin_token: Option<String>,

    // Whole-request timeout applied by the tower stack
    pub request_timeout_secs: u64,

    // Timeout around each call into the traffic store
    pub store_timeout_ms: u64,

    // Number of report ids remembered per node (0 disables deduplication)
    pub report_dedupe_window: usize,

    // Request body limit
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            listen_port: STANDARD_PORT_HTTP,
            node_keys: Vec::new(),
            seed_file: None,
            admin_token: None,
            request_timeout_secs: 10,
            store_timeout_ms: 2000,
            report_dedupe_window: 1024,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(crate::config_error!("request timeout must be at least one second"));
        }
        if self.store_timeout_ms == 0 {
            return Err(crate::config_error!("store timeout must be positive"));
        }
        if self.max_body_bytes == 0 {
            return Err(crate::config_error!("body limit must be positive"));
        }
        if matches!(&self.admin_token, Some(token) if token.trim().is_empty()) {
            return Err(crate::config_error!("admin token must not be blank"));
        }
        if let Some(key) = self.node_keys.iter().find(|k| k.trim().is_empty()) {
            return Err(crate::config_error!("blank node key in {:?}", key));
        }
        Ok(())
    }

    /// Seed data from `seed_file` merged with `node_keys`
    pub fn load_seed(&self) -> Result<SeedData> {
        let mut seed = match &self.seed_file {
            Some(path) => SeedData::from_file(path)?,
            None => SeedData::default(),
        };
        seed.nodes.extend(self.node_keys.iter().cloned());
        Ok(seed)
    }
}

/// Users and nodes known before the first request arrives
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SeedData {
    #[serde(default)]
    pub users: Vec<TrafficRecord>,
    #[serde(default)]
    pub nodes: Vec<String>,
}

impl SeedData {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
