//! Connector-related domain events.

use serde::{Deserialize, Serialize};

use crate::types::id::{ConnectorId, StationId};

/// Events related to physical connectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectorEvent {
    /// A connector changed its reported status.
    ConnectorStatusUpdate {
        /// The station owning the connector.
        station_id: StationId,
        /// The connector number.
        connector_id: ConnectorId,
        /// The new status (`available`, `occupied`, ...).
        status: String,
        /// Station-reported error code, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
    },
}

impl ConnectorEvent {
    /// The catalogue name of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConnectorStatusUpdate { .. } => "connector_status_update",
        }
    }
}
