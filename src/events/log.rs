//! Append-only event log.
//!
//! Lives in process memory only: anything appended is lost when the
//! authority restarts.
use std::sync::RwLock;

use super::{Event, EventBody};
use crate::error::Result;

#[derive(Debug, Default)]
pub struct EventLog {
    events: RwLock<Vec<Event>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `body` at the next sequence number and return that number
    pub fn append(&self, body: EventBody) -> Result<u64> {
        let mut events = self.events.write().map_err(|e| {
            crate::concurrency_error!("Failed to acquire event log write lock: {}", e)
        })?;
        let sequence = events.len() as u64;
        events.push(Event { sequence, body });
        Ok(sequence)
    }

    /// All events with `sequence >= revision`, oldest first
    pub fn read_since(&self, revision: u64) -> Result<Vec<Event>> {
        self.snapshot_since(revision).map(|(events, _)| events)
    }

    /// Events since `revision` together with the log length seen by the same read
    pub fn snapshot_since(&self, revision: u64) -> Result<(Vec<Event>, u64)> {
        let events = self.events.read().map_err(|e| {
            crate::concurrency_error!("Failed to acquire event log read lock: {}", e)
        })?;
        let len = events.len() as u64;
        let start = usize::try_from(revision.min(len)).unwrap_or(events.len());
        Ok((events[start..].to_vec(), len))
    }

    pub fn len(&self) -> Result<u64> {
        let events = self.events.read().map_err(|e| {
            crate::concurrency_error!("Failed to acquire event log read lock: {}", e)
        })?;
        Ok(events.len() as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }
}
