//! Cost and performance summary returned by `stopSession`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use voltstream_core::types::id::SessionId;

use super::model::Session;
use super::status::SessionStatus;

/// Final figures for a terminated session.
///
/// Stopping an already-terminal session returns the existing summary
/// without mutating metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// The session this summarizes.
    pub session_id: SessionId,
    /// Terminal status.
    pub status: SessionStatus,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// When the session terminated.
    pub ended_at: Option<DateTime<Utc>>,
    /// Total duration in seconds.
    pub duration_seconds: i64,
    /// Total energy delivered in kWh.
    pub energy_delivered_kwh: f64,
    /// Average power over the session in kW.
    pub avg_power_kw: f64,
    /// Peak power observed in kW.
    pub max_power_kw: f64,
    /// Final cost, when the session completed with delivered energy.
    pub cost_amount: Option<f64>,
    /// Cost currency code.
    pub cost_currency: Option<String>,
    /// Whether the station never confirmed the stop.
    pub unconfirmed_by_station: bool,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id,
            status: session.status,
            started_at: session.started_at,
            ended_at: session.ended_at,
            duration_seconds: session.duration_seconds.unwrap_or(0),
            energy_delivered_kwh: session.energy_delivered_kwh,
            avg_power_kw: session.avg_power_kw.unwrap_or(0.0),
            max_power_kw: session.max_power_kw,
            cost_amount: session.cost_amount,
            cost_currency: session.cost_currency.clone(),
            unconfirmed_by_station: session.unconfirmed_by_station,
        }
    }
}
