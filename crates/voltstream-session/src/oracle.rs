//! Connector availability oracle.
//!
//! Read-mostly cache over the connector store. A cache miss falls back to
//! the store; availability flips between `available` and `occupied` only
//! on confirmed protocol exchanges, never speculatively.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, warn};

use voltstream_core::types::id::{ConnectorId, StationId};
use voltstream_core::{AppError, AppResult};
use voltstream_entity::connector::{Connector, ConnectorStatus};

use crate::ports::ConnectorStore;

pub struct ConnectorOracle {
    store: Arc<dyn ConnectorStore>,
    cache: DashMap<(StationId, ConnectorId), Connector>,
}

impl ConnectorOracle {
    pub fn new(store: Arc<dyn ConnectorStore>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// The connector's current record, from cache or store.
    pub async fn get(
        &self,
        station_id: &StationId,
        connector_id: ConnectorId,
    ) -> AppResult<Option<Connector>> {
        let key = (station_id.clone(), connector_id);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Some(cached.clone()));
        }
        let fetched = self.store.get_connector(station_id, connector_id).await?;
        if let Some(connector) = &fetched {
            self.cache.insert(key, connector.clone());
        }
        Ok(fetched)
    }

    /// All connectors of one station, straight from the store.
    pub async fn connectors_for_station(
        &self,
        station_id: &StationId,
    ) -> AppResult<Vec<Connector>> {
        self.store.connectors_for_station(station_id).await
    }

    /// Check that the connector exists and may accept a session.
    ///
    /// Callers hold the registry's per-connector guard across this check
    /// and the session insertion, which makes check-then-create atomic.
    pub async fn check_available(
        &self,
        station_id: &StationId,
        connector_id: ConnectorId,
    ) -> AppResult<Connector> {
        let connector = self.get(station_id, connector_id).await?.ok_or_else(|| {
            AppError::connector_unavailable(format!(
                "Unknown connector {connector_id} on station {station_id}"
            ))
        })?;
        if !connector.is_available() {
            return Err(AppError::connector_unavailable(format!(
                "Connector {connector_id} on station {station_id} is {}",
                connector.status
            )));
        }
        Ok(connector)
    }

    /// Flip the connector's status after a confirmed exchange.
    pub async fn set_status(
        &self,
        station_id: &StationId,
        connector_id: ConnectorId,
        status: ConnectorStatus,
    ) -> AppResult<Connector> {
        let mut connector = self.get(station_id, connector_id).await?.ok_or_else(|| {
            AppError::connector_unavailable(format!(
                "Unknown connector {connector_id} on station {station_id}"
            ))
        })?;
        connector.status = status;
        connector.updated_at = Utc::now();
        self.store.save_connector(&connector).await?;
        self.cache
            .insert((station_id.clone(), connector_id), connector.clone());
        debug!(
            station_id = %station_id,
            connector_id = %connector_id,
            status = %status,
            "Connector status updated"
        );
        Ok(connector)
    }

    /// Apply a station-reported status (StatusNotification). Unknown
    /// protocol statuses are logged and ignored; unknown connectors are
    /// recorded so later reports have a row to update.
    pub async fn apply_status_report(
        &self,
        station_id: &StationId,
        connector_id: ConnectorId,
        reported: &str,
    ) -> AppResult<Option<Connector>> {
        let Some(status) = Self::map_reported_status(reported) else {
            warn!(
                station_id = %station_id,
                connector_id = %connector_id,
                reported = reported,
                "Ignoring unknown connector status"
            );
            return Ok(None);
        };

        let mut connector = match self.get(station_id, connector_id).await? {
            Some(connector) => connector,
            None => Connector {
                station_id: station_id.clone(),
                connector_id,
                connector_type: "Unknown".to_string(),
                power_kw: 0.0,
                status,
                updated_at: Utc::now(),
            },
        };
        connector.status = status;
        connector.updated_at = Utc::now();
        self.store.save_connector(&connector).await?;
        self.cache
            .insert((station_id.clone(), connector_id), connector.clone());
        Ok(Some(connector))
    }

    fn map_reported_status(reported: &str) -> Option<ConnectorStatus> {
        match reported {
            "Available" => Some(ConnectorStatus::Available),
            "Preparing" | "Charging" | "SuspendedEV" | "SuspendedEVSE" | "Finishing"
            | "Occupied" => Some(ConnectorStatus::Occupied),
            "Reserved" => Some(ConnectorStatus::Reserved),
            "Unavailable" | "Faulted" => Some(ConnectorStatus::OutOfService),
            _ => None,
        }
    }
}
