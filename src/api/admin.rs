use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{event, instrument, Level};

use crate::admin::{AppliedChange, TrafficChange};
use crate::authority::Authority;
use crate::error::Result;
use crate::events::Event;
use crate::ledger::TrafficRecord;
use crate::nodes::NodeStatus;

/// Reject calls without the configured bearer token. With no token
/// configured every call is rejected.
pub async fn require_admin_token(
    State(state): State<Authority>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    let authorized = match state.settings.admin_token.as_deref() {
        Some(token) => presented == Some(token),
        None => false,
    };
    if authorized {
        next.run(request).await
    } else {
        event!(
            Level::WARN,
            message = "Rejected admin request",
            path = request.uri().path(),
            configured = state.settings.admin_token.is_some()
        );
        (StatusCode::UNAUTHORIZED, "Admin token required").into_response()
    }
}

#[instrument(skip(state), level = "debug")]
pub async fn set_user_traffic(
    State(state): State<Authority>,
    axum::Json(change): axum::Json<TrafficChange>,
) -> Result<axum::Json<AppliedChange>> {
    let applied = state.admin.apply_admin_traffic_change(change).await?;
    Ok(axum::Json(applied))
}

#[instrument(skip(state), level = "debug")]
pub async fn create_user(
    State(state): State<Authority>,
    axum::Json(record): axum::Json<TrafficRecord>,
) -> Result<(StatusCode, axum::Json<TrafficRecord>)> {
    let record = state.admin.provision_user(record).await?;
    Ok((StatusCode::CREATED, axum::Json(record)))
}

#[instrument(skip(state), level = "debug")]
pub async fn list_users(State(state): State<Authority>) -> Result<axum::Json<Vec<TrafficRecord>>> {
    Ok(axum::Json(state.ledger.list().await?))
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RegisterNodeRequest {
    pub key: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RegisterNodeResponse {
    pub registered: bool,
}

#[instrument(skip(state, request), level = "debug")]
pub async fn register_node(
    State(state): State<Authority>,
    axum::Json(request): axum::Json<RegisterNodeRequest>,
) -> (StatusCode, axum::Json<RegisterNodeResponse>) {
    let registered = state.admin.register_node(&request.key);
    let status = if registered {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, axum::Json(RegisterNodeResponse { registered }))
}

#[instrument(skip(state), level = "debug")]
pub async fn list_nodes(State(state): State<Authority>) -> axum::Json<Vec<NodeStatus>> {
    axum::Json(state.nodes.list().await)
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
}

#[instrument(skip(state), level = "debug")]
pub async fn list_events(
    State(state): State<Authority>,
    Query(query): Query<EventsQuery>,
) -> Result<axum::Json<Vec<Event>>> {
    Ok(axum::Json(state.log.read_since(query.since)?))
}
