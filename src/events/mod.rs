//! Change records exchanged between the authority and its nodes.
//!
//! Two kinds exist and they merge differently on the receiving side:
//! `inc_used_traffic` is a delta that accumulates, `update_user_traffic`
//! is a full snapshot applied last-writer-wins.
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod log;

use crate::error::{Result, TrafficSyncError};
pub use log::EventLog;

pub const INC_USED_TRAFFIC: &str = "inc_used_traffic";
pub const UPDATE_USER_TRAFFIC: &str = "update_user_traffic";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventBody {
    /// Node → authority: bytes used since the node's last report
    IncUsedTraffic {
        user_id: String,
        dt: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        report_id: Option<String>,
    },
    /// Authority → node: the user's counters after an admin change
    UpdateUserTraffic {
        user_id: String,
        total_traffic: u64,
        used_traffic: u64,
    },
}

impl EventBody {
    pub fn kind(&self) -> &'static str {
        match self {
            EventBody::IncUsedTraffic { .. } => INC_USED_TRAFFIC,
            EventBody::UpdateUserTraffic { .. } => UPDATE_USER_TRAFFIC,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            EventBody::IncUsedTraffic { user_id, .. } => user_id,
            EventBody::UpdateUserTraffic { user_id, .. } => user_id,
        }
    }
}

/// A log entry. `sequence` is the entry's index in the log.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Event {
    pub sequence: u64,
    #[serde(flatten)]
    pub body: EventBody,
}

/// A usage delta reported by a node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsageReport {
    pub user_id: String,
    pub dt: i64,
    pub report_id: Option<String>,
}

/// Decode one inbound entry of a sync batch.
///
/// Only `inc_used_traffic` is accepted from nodes; every other type,
/// including the outbound-only snapshot type, is unrecognized here.
pub fn parse_inbound(raw: Value) -> Result<UsageReport> {
    let kind = match raw.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(other) => {
            return Err(TrafficSyncError::MalformedEvent(format!(
                "event type is not a string: {}",
                other
            )))
        }
        None => {
            return Err(TrafficSyncError::MalformedEvent(
                "missing event type".to_string(),
            ))
        }
    };
    if kind != INC_USED_TRAFFIC {
        return Err(TrafficSyncError::UnrecognizedEventType(kind));
    }

    match serde_json::from_value::<EventBody>(raw) {
        Ok(EventBody::IncUsedTraffic {
            user_id,
            dt,
            report_id,
        }) => Ok(UsageReport {
            user_id,
            dt,
            report_id,
        }),
        Ok(other) => Err(TrafficSyncError::UnrecognizedEventType(
            other.kind().to_string(),
        )),
        Err(err) => Err(TrafficSyncError::MalformedEvent(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn snapshot_event_wire_shape() {
        let event = Event {
            sequence: 3,
            body: EventBody::UpdateUserTraffic {
                user_id: "u1".into(),
                total_traffic: 1_073_741_824,
                used_traffic: 42,
            },
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "sequence": 3,
                "type": "update_user_traffic",
                "user_id": "u1",
                "total_traffic": 1_073_741_824u64,
                "used_traffic": 42
            })
        );
    }

    #[test]
    fn parses_usage_report() {
        let report = parse_inbound(json!({"type": "inc_used_traffic", "user_id": "u1", "dt": 100}))
            .unwrap();
        assert_eq!(
            report,
            UsageReport {
                user_id: "u1".into(),
                dt: 100,
                report_id: None
            }
        );

        let report = parse_inbound(
            json!({"type": "inc_used_traffic", "user_id": "u1", "dt": 5, "report_id": "r-1"}),
        )
        .unwrap();
        assert_eq!(report.report_id.as_deref(), Some("r-1"));
    }

    #[test]
    fn rejects_unknown_and_outbound_types() {
        let err = parse_inbound(json!({"type": "reboot_node"})).unwrap_err();
        assert!(matches!(err, TrafficSyncError::UnrecognizedEventType(k) if k == "reboot_node"));

        let err = parse_inbound(json!({
            "type": "update_user_traffic",
            "user_id": "u1",
            "total_traffic": 1,
            "used_traffic": 1
        }))
        .unwrap_err();
        assert!(matches!(err, TrafficSyncError::UnrecognizedEventType(_)));
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(matches!(
            parse_inbound(json!({"user_id": "u1", "dt": 1})),
            Err(TrafficSyncError::MalformedEvent(_))
        ));
        assert!(matches!(
            parse_inbound(json!({"type": 7})),
            Err(TrafficSyncError::MalformedEvent(_))
        ));
        assert!(matches!(
            parse_inbound(json!({"type": "inc_used_traffic", "user_id": "u1", "dt": "lots"})),
            Err(TrafficSyncError::MalformedEvent(_))
        ));
    }
}
