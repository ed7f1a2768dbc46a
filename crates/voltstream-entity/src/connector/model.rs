//! Connector entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use voltstream_core::types::id::{ConnectorId, StationId};

/// Reported status of a physical connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorStatus {
    Available,
    Occupied,
    Reserved,
    OutOfService,
}

impl ConnectorStatus {
    /// The status name as exposed in events and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Reserved => "reserved",
            Self::OutOfService => "out_of_service",
        }
    }
}

impl std::fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single physical charging outlet on a station.
///
/// Owned by the external store and cached read-mostly by the availability
/// oracle; only confirmed protocol exchanges flip a connector between
/// `available` and `occupied`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connector {
    /// The station owning this connector.
    pub station_id: StationId,
    /// The connector number within the station.
    pub connector_id: ConnectorId,
    /// Plug type (`"Type2"`, `"CCS"`, `"CHAdeMO"`).
    pub connector_type: String,
    /// Rated power in kW.
    pub power_kw: f64,
    /// Current reported status.
    pub status: ConnectorStatus,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Connector {
    /// Whether the connector may accept a new session.
    pub fn is_available(&self) -> bool {
        self.status == ConnectorStatus::Available
    }
}
