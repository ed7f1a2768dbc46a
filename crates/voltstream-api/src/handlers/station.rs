//! Station and connector handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use voltstream_core::types::id::StationId;
use voltstream_entity::connector::Connector;

use crate::error::ApiError;
use crate::state::AppState;

/// Station connectivity as seen by the gateway.
#[derive(Debug, Serialize)]
pub struct StationStatus {
    pub station_id: StationId,
    pub connected: bool,
    pub last_seen: Option<chrono::DateTime<chrono::Utc>>,
}

/// GET /api/stations/{station_id}
pub async fn station_status(
    State(state): State<AppState>,
    Path(station_id): Path<StationId>,
) -> Json<StationStatus> {
    Json(StationStatus {
        connected: state.gateway.is_connected(&station_id),
        last_seen: state.gateway.last_seen(&station_id),
        station_id,
    })
}

/// GET /api/stations/{station_id}/connectors
pub async fn station_connectors(
    State(state): State<AppState>,
    Path(station_id): Path<StationId>,
) -> Result<Json<Vec<Connector>>, ApiError> {
    let connectors = state
        .sessions
        .oracle()
        .connectors_for_station(&station_id)
        .await?;
    Ok(Json(connectors))
}
