use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Plain-text body returned to nodes presenting an unregistered key
pub const INVALID_KEY_BODY: &str = "Invalid key";

/// Main error type for the traffic sync authority
#[derive(Debug)]
pub enum TrafficSyncError {
    /// Configuration or CLI argument errors
    Config(String),

    /// Sync request carried a key that is not registered
    UnknownNode(String),

    /// Ledger has no record for this user
    UnknownUser(String),

    /// Provisioning a user that already has a ledger record
    UserExists(String),

    /// Inbound event with a type this authority does not handle
    UnrecognizedEventType(String),

    /// Inbound event whose fields do not match its declared type
    MalformedEvent(String),

    /// Backing store failed or did not answer in time
    StorageUnavailable(String),

    /// System I/O errors
    Io(std::io::Error),

    /// JSON serialization/deserialization errors
    Serialization(serde_json::Error),

    /// Internal lock poisoning or concurrency errors
    Concurrency(String),

    /// Could not reach the remote authority
    Transport(String),

    /// Authority answered with anything but a success shape
    Rejected { status: u16, body: String },
}

impl fmt::Display for TrafficSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrafficSyncError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TrafficSyncError::UnknownNode(_) => write!(f, "{}", INVALID_KEY_BODY),
            TrafficSyncError::UnknownUser(user_id) => write!(f, "User not found: {}", user_id),
            TrafficSyncError::UserExists(user_id) => write!(f, "User already exists: {}", user_id),
            TrafficSyncError::UnrecognizedEventType(kind) => {
                write!(f, "Unknown event type: {}", kind)
            }
            TrafficSyncError::MalformedEvent(msg) => write!(f, "Malformed event: {}", msg),
            TrafficSyncError::StorageUnavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            TrafficSyncError::Io(err) => write!(f, "I/O error: {}", err),
            TrafficSyncError::Serialization(err) => write!(f, "Serialization error: {}", err),
            TrafficSyncError::Concurrency(msg) => write!(f, "Concurrency error: {}", msg),
            TrafficSyncError::Transport(msg) => write!(f, "Transport error: {}", msg),
            TrafficSyncError::Rejected { status, body } => {
                write!(f, "Rejected with status {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for TrafficSyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrafficSyncError::Io(err) => Some(err),
            TrafficSyncError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, TrafficSyncError>;

impl IntoResponse for TrafficSyncError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        // Nodes only ever look for the plain-text rejection here
        if let TrafficSyncError::UnknownNode(_) = self {
            return (status_code, INVALID_KEY_BODY).into_response();
        }

        let error_response = json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl TrafficSyncError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            TrafficSyncError::Config(_) => StatusCode::BAD_REQUEST,
            TrafficSyncError::UnknownNode(_) => StatusCode::FORBIDDEN,
            TrafficSyncError::UnknownUser(_) => StatusCode::NOT_FOUND,
            TrafficSyncError::UserExists(_) => StatusCode::CONFLICT,
            TrafficSyncError::UnrecognizedEventType(_) => StatusCode::BAD_REQUEST,
            TrafficSyncError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
            TrafficSyncError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            TrafficSyncError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TrafficSyncError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TrafficSyncError::Concurrency(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TrafficSyncError::Transport(_) => StatusCode::BAD_GATEWAY,
            TrafficSyncError::Rejected { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            TrafficSyncError::Config(_) => "configuration_error",
            TrafficSyncError::UnknownNode(_) => "unknown_node",
            TrafficSyncError::UnknownUser(_) => "unknown_user",
            TrafficSyncError::UserExists(_) => "user_exists",
            TrafficSyncError::UnrecognizedEventType(_) => "unrecognized_event_type",
            TrafficSyncError::MalformedEvent(_) => "malformed_event",
            TrafficSyncError::StorageUnavailable(_) => "storage_unavailable",
            TrafficSyncError::Io(_) => "io_error",
            TrafficSyncError::Serialization(_) => "serialization_error",
            TrafficSyncError::Concurrency(_) => "concurrency_error",
            TrafficSyncError::Transport(_) => "transport_error",
            TrafficSyncError::Rejected { .. } => "rejected",
        }
    }

    /// Whole-call failures that a node should retry unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrafficSyncError::StorageUnavailable(_)
                | TrafficSyncError::Concurrency(_)
                | TrafficSyncError::Transport(_)
                | TrafficSyncError::Rejected { .. }
        )
    }
}

// Conversions from common error types
impl From<std::io::Error> for TrafficSyncError {
    fn from(err: std::io::Error) -> Self {
        TrafficSyncError::Io(err)
    }
}

impl From<serde_json::Error> for TrafficSyncError {
    fn from(err: serde_json::Error) -> Self {
        TrafficSyncError::Serialization(err)
    }
}

impl From<reqwest::Error> for TrafficSyncError {
    fn from(err: reqwest::Error) -> Self {
        TrafficSyncError::Transport(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for TrafficSyncError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        TrafficSyncError::StorageUnavailable("store call timed out".to_string())
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::TrafficSyncError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::TrafficSyncError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! storage_error {
    ($msg:expr) => {
        $crate::error::TrafficSyncError::StorageUnavailable($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::TrafficSyncError::StorageUnavailable(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! concurrency_error {
    ($msg:expr) => {
        $crate::error::TrafficSyncError::Concurrency($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::TrafficSyncError::Concurrency(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_err = TrafficSyncError::Config("Invalid port".to_string());
        assert_eq!(config_err.to_string(), "Configuration error: Invalid port");

        let user_err = TrafficSyncError::UnknownUser("ghost".to_string());
        assert_eq!(user_err.to_string(), "User not found: ghost");

        let node_err = TrafficSyncError::UnknownNode("nope".to_string());
        assert_eq!(node_err.to_string(), "Invalid key");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            TrafficSyncError::UnknownNode("k".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            TrafficSyncError::UnknownUser("u".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TrafficSyncError::StorageUnavailable("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_retryable() {
        assert!(TrafficSyncError::StorageUnavailable("down".into()).is_retryable());
        assert!(!TrafficSyncError::UnknownNode("k".into()).is_retryable());
    }

    #[test]
    fn test_macros() {
        let err = config_error!("Port {} is invalid", 65536);
        assert_eq!(err.to_string(), "Configuration error: Port 65536 is invalid");

        let err = storage_error!("store offline");
        assert_eq!(err.to_string(), "Storage unavailable: store offline");
    }
}
