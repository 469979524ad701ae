//! Registered nodes and their delivery cursors.
//!
//! Each node owns its own async mutex, so syncs from different nodes never
//! contend with each other. Two syncs carrying the same key are serialized.
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use papaya::HashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Result, TrafficSyncError};

pub type NodeHandle = Arc<Mutex<NodeState>>;

/// Short, log-safe prefix of a node key. Never more than half the key.
pub fn key_hint(key: &str) -> String {
    let shown = (key.chars().count() / 2).min(4);
    let prefix: String = key.chars().take(shown).collect();
    format!("{}…", prefix)
}

/// FIFO set of the most recent report ids applied for one node
#[derive(Debug, Default)]
pub struct ReportWindow {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl ReportWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity.min(4096)),
            seen: HashSet::new(),
        }
    }

    pub fn contains(&self, report_id: &str) -> bool {
        self.seen.contains(report_id)
    }

    pub fn remember(&mut self, report_id: String) {
        if self.capacity == 0 || self.seen.contains(&report_id) {
            return;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(report_id.clone());
        self.order.push_back(report_id);
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Mutable per-node state, only touched by the sync coordinator
#[derive(Debug)]
pub struct NodeState {
    /// `None` until the first successful sync
    last_delivered: Option<u64>,
    last_sync_at: Option<DateTime<Utc>>,
    sync_count: u64,
    pub recent_reports: ReportWindow,
}

impl NodeState {
    fn new(dedupe_window: usize) -> Self {
        Self {
            last_delivered: None,
            last_sync_at: None,
            sync_count: 0,
            recent_reports: ReportWindow::new(dedupe_window),
        }
    }

    pub fn cursor(&self) -> u64 {
        self.last_delivered.unwrap_or(0)
    }

    /// Move the cursor forward to `to`; never moves it back
    pub fn advance(&mut self, to: u64) -> u64 {
        let cursor = self.cursor().max(to);
        self.last_delivered = Some(cursor);
        self.last_sync_at = Some(Utc::now());
        self.sync_count += 1;
        cursor
    }

    pub fn is_synchronized(&self) -> bool {
        self.last_delivered.is_some()
    }
}

/// Admin view of a node. `key` is a `key_hint`, never the secret itself.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeStatus {
    pub key: String,
    pub cursor: Option<u64>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sync_count: u64,
}

#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, NodeHandle>,
    dedupe_window: usize,
}

impl NodeRegistry {
    pub fn new(dedupe_window: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            dedupe_window,
        }
    }

    /// Register a node key; returns false if it was already known
    pub fn register(&self, key: &str) -> bool {
        let state = Arc::new(Mutex::new(NodeState::new(self.dedupe_window)));
        self.nodes.pin().try_insert(key.to_string(), state).is_ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nodes.pin().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn lookup(&self, key: &str) -> Result<NodeHandle> {
        self.nodes
            .pin()
            .get(key)
            .cloned()
            .ok_or_else(|| TrafficSyncError::UnknownNode(key_hint(key)))
    }

    pub async fn cursor(&self, key: &str) -> Result<u64> {
        let handle = self.lookup(key)?;
        let state = handle.lock().await;
        Ok(state.cursor())
    }

    pub async fn list(&self) -> Vec<NodeStatus> {
        let mut handles: Vec<(String, NodeHandle)> = {
            let nodes = self.nodes.pin();
            let handles = nodes
                .iter()
                .map(|(key, handle)| (key.clone(), handle.clone()))
                .collect();
            handles
        };
        handles.sort_by(|a, b| a.0.cmp(&b.0));

        let mut statuses = Vec::with_capacity(handles.len());
        for (key, handle) in handles {
            let state = handle.lock().await;
            statuses.push(NodeStatus {
                key: key_hint(&key),
                cursor: state.last_delivered,
                last_sync_at: state.last_sync_at,
                sync_count: state.sync_count,
            });
        }
        statuses
    }
}
