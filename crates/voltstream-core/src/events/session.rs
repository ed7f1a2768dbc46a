//! Charging-session domain events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::id::{ConnectorId, SessionId, StationId, UserId};

/// Severity of an operational charging alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Events related to charging sessions.
///
/// Delivery is best-effort relative to the authoritative state transition,
/// which is committed to the session registry before any of these are
/// published.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A session was created and entered the lifecycle.
    SessionCreated {
        /// The session ID.
        session_id: SessionId,
        /// The user who started the session.
        user_id: UserId,
        /// The station hosting the session.
        station_id: StationId,
        /// The connector in use.
        connector_id: ConnectorId,
        /// When the session was created.
        started_at: DateTime<Utc>,
    },
    /// A session changed lifecycle status.
    SessionStatusUpdate {
        /// The session ID.
        session_id: SessionId,
        /// The new status (lifecycle state name).
        status: String,
        /// Fault code, present only in failed states.
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
        /// Fault message, present only in failed states.
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
    /// A session reached COMPLETED with its final metrics.
    SessionCompleted {
        /// The session ID.
        session_id: SessionId,
        /// Total energy delivered in kWh.
        energy_delivered_kwh: f64,
        /// Total duration in seconds.
        duration_seconds: i64,
        /// Final cost amount.
        cost_amount: f64,
        /// Cost currency code.
        cost_currency: String,
    },
    /// A session was evicted from the registry.
    SessionDeleted {
        /// The session ID.
        session_id: SessionId,
    },
    /// A live telemetry sample during charging.
    ChargingProgress {
        /// The session ID.
        session_id: SessionId,
        /// Cumulative energy delivered in kWh.
        energy_delivered_kwh: f64,
        /// Instantaneous power in kW.
        current_power_kw: f64,
        /// Battery or connector temperature in °C, when reported.
        #[serde(skip_serializing_if = "Option::is_none")]
        temperature_celsius: Option<f64>,
    },
    /// A severity-leveled operational warning for an active session.
    ChargingAlert {
        /// The session ID.
        session_id: SessionId,
        /// Alert severity.
        severity: AlertSeverity,
        /// Machine-readable alert code.
        code: String,
        /// Human-readable alert message.
        message: String,
    },
}

impl SessionEvent {
    /// The catalogue name of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session_created",
            Self::SessionStatusUpdate { .. } => "session_status_update",
            Self::SessionCompleted { .. } => "session_completed",
            Self::SessionDeleted { .. } => "session_deleted",
            Self::ChargingProgress { .. } => "charging_progress",
            Self::ChargingAlert { .. } => "charging_alert",
        }
    }

    /// The session this event concerns.
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::SessionCreated { session_id, .. }
            | Self::SessionStatusUpdate { session_id, .. }
            | Self::SessionCompleted { session_id, .. }
            | Self::SessionDeleted { session_id }
            | Self::ChargingProgress { session_id, .. }
            | Self::ChargingAlert { session_id, .. } => *session_id,
        }
    }
}
