//! Typed inbound events dispatched from station connections.
//!
//! Station-initiated CALLs are parsed into these variants and handed to
//! the session layer over a channel; the connection read loop never
//! blocks on a handler.

use chrono::{DateTime, Utc};

use voltstream_core::types::id::{ConnectorId, StationId};

/// An event received from (or about) a station connection.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// The station's transport came up.
    StationConnected { station_id: StationId },
    /// The station's transport dropped; reconnection is in progress.
    StationDisconnected { station_id: StationId },
    /// The station reported a connector status change.
    StatusNotification {
        station_id: StationId,
        connector_id: ConnectorId,
        status: String,
        error_code: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// The station reported meter samples for a transaction.
    MeterValues {
        station_id: StationId,
        connector_id: ConnectorId,
        transaction_id: Option<i32>,
        /// Cumulative imported energy in Wh.
        energy_wh: Option<f64>,
        /// Instantaneous power in W.
        power_w: Option<f64>,
        temperature_celsius: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    /// The station sent a liveness heartbeat.
    Heartbeat {
        station_id: StationId,
        timestamp: DateTime<Utc>,
    },
}

impl InboundEvent {
    /// The station this event concerns.
    pub fn station_id(&self) -> &StationId {
        match self {
            Self::StationConnected { station_id }
            | Self::StationDisconnected { station_id }
            | Self::StatusNotification { station_id, .. }
            | Self::MeterValues { station_id, .. }
            | Self::Heartbeat { station_id, .. } => station_id,
        }
    }
}
