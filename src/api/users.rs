use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::authority::Authority;
use crate::error::Result;
use crate::ledger::TrafficRecord;

/// A user's own view of their quota
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTrafficResponse {
    pub user_id: String,
    pub total_traffic: u64,
    pub used_traffic: u64,
}

impl From<TrafficRecord> for UserTrafficResponse {
    fn from(record: TrafficRecord) -> Self {
        Self {
            user_id: record.user_id,
            total_traffic: record.total,
            used_traffic: record.used,
        }
    }
}

#[instrument(skip(state), level = "debug")]
pub async fn user_traffic(
    Path(user_id): Path<String>,
    State(state): State<Authority>,
) -> Result<axum::Json<UserTrafficResponse>> {
    let record = state.ledger.get(&user_id).await?;
    Ok(axum::Json(record.into()))
}
