use axum::extract::State;
use tracing::instrument;

use crate::authority::Authority;
use crate::error::Result;
use crate::sync::{SyncRequest, SyncResponse};

#[instrument(skip(state, request), level = "debug")]
pub async fn sync(
    State(state): State<Authority>,
    axum::Json(request): axum::Json<SyncRequest>,
) -> Result<axum::Json<SyncResponse>> {
    let inbound = request.events.unwrap_or_default();
    let outcome = state.coordinator.sync(&request.key, inbound).await?;
    Ok(axum::Json(SyncResponse::ok(outcome.events)))
}
