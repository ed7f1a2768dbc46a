//! The protocol gateway facade.
//!
//! [`ProtocolGateway`] owns one [`StationHandle`] per registered station
//! and exposes typed request/response operations to the session layer.
//! Requests against a station whose transport is down fail fast with
//! `STATION_UNREACHABLE` instead of queueing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info};

use voltstream_core::config::gateway::GatewayConfig;
use voltstream_core::types::id::{ConnectorId, StationId};
use voltstream_core::{AppError, AppResult};

use crate::connection::{spawn_connection, StationHandle};
use crate::inbound::InboundEvent;
use crate::message::{Action, Call, GatewayError, OcppMessage};
use crate::payloads::{
    AuthorizationStatus, AuthorizeRequest, AuthorizeResponse, IdTagInfo, HeartbeatRequest,
    HeartbeatResponse, StartTransactionRequest, StartTransactionResponse,
    StatusNotificationRequest, StopTransactionRequest, StopTransactionResponse,
};
use crate::transport::TransportConnector;

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout => {
                AppError::protocol_timeout("Station did not respond within the request timeout")
            }
            GatewayError::Unreachable | GatewayError::ConnectionClosed => {
                AppError::station_unreachable("Station transport is down")
            }
            GatewayError::Remote {
                ref code,
                ref description,
                ..
            } => AppError::protocol(format!("Station returned {code:?}: {description}")),
            GatewayError::Json(e) => AppError::from(e),
            other => AppError::with_source(
                voltstream_core::error::ErrorKind::ProtocolError,
                "Protocol message handling failed",
                other,
            ),
        }
    }
}

/// Gateway to all registered charging stations.
pub struct ProtocolGateway {
    config: GatewayConfig,
    connector: Arc<dyn TransportConnector>,
    stations: DashMap<StationId, StationHandle>,
    inbound_tx: mpsc::Sender<InboundEvent>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ProtocolGateway {
    /// Create a gateway and the inbound event stream its connections feed.
    pub fn new(
        config: GatewayConfig,
        connector: Arc<dyn TransportConnector>,
    ) -> (Self, mpsc::Receiver<InboundEvent>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_buffer_size);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (
            Self {
                config,
                connector,
                stations: DashMap::new(),
                inbound_tx,
                shutdown_tx,
                shutdown_rx,
            },
            inbound_rx,
        )
    }

    /// Register a station and start its connection task. Idempotent: a
    /// second call for the same station is a no-op.
    pub fn register_station(&self, station_id: StationId) {
        if self.stations.contains_key(&station_id) {
            return;
        }
        info!(station_id = %station_id, "Registering station connection");
        let handle = spawn_connection(
            station_id.clone(),
            Arc::clone(&self.connector),
            self.config.clone(),
            self.inbound_tx.clone(),
            self.shutdown_rx.clone(),
        );
        self.stations.insert(station_id, handle);
    }

    /// Whether the station's transport is currently up.
    pub fn is_connected(&self, station_id: &StationId) -> bool {
        self.stations
            .get(station_id)
            .map(|h| h.is_connected())
            .unwrap_or(false)
    }

    /// When a frame was last received from the station.
    pub fn last_seen(&self, station_id: &StationId) -> Option<DateTime<Utc>> {
        self.stations.get(station_id).map(|h| h.last_seen())
    }

    /// Ask the station to authorize a charging token.
    pub async fn authorize(&self, station_id: &StationId, id_tag: &str) -> AppResult<IdTagInfo> {
        let payload = AuthorizeRequest {
            id_tag: id_tag.to_string(),
        };
        let response: AuthorizeResponse =
            self.request(station_id, Action::Authorize, payload).await?;
        Ok(response.id_tag_info)
    }

    /// Ask the station to start a transaction on a connector. An accepted
    /// response carries the station-assigned transaction ID.
    pub async fn start_transaction(
        &self,
        station_id: &StationId,
        connector_id: ConnectorId,
        id_tag: &str,
        meter_start: i32,
    ) -> AppResult<StartTransactionResponse> {
        let payload = StartTransactionRequest {
            connector_id: connector_id.as_i32(),
            id_tag: id_tag.to_string(),
            meter_start,
            timestamp: Utc::now(),
        };
        let response: StartTransactionResponse = self
            .request(station_id, Action::StartTransaction, payload)
            .await?;
        if response.id_tag_info.status != AuthorizationStatus::Accepted {
            return Err(AppError::authorization_rejected(format!(
                "Station rejected token: {:?}",
                response.id_tag_info.status
            )));
        }
        Ok(response)
    }

    /// Ask the station to stop a transaction.
    pub async fn stop_transaction(
        &self,
        station_id: &StationId,
        transaction_id: i32,
        meter_stop: i32,
        reason: Option<&str>,
    ) -> AppResult<StopTransactionResponse> {
        let payload = StopTransactionRequest {
            transaction_id,
            id_tag: None,
            meter_stop,
            timestamp: Utc::now(),
            reason: reason.map(str::to_string),
        };
        self.request(station_id, Action::StopTransaction, payload)
            .await
    }

    /// Push a connector status to the station, fire-and-forget: the
    /// frame is queued without a pending-table entry and no reply is
    /// awaited.
    pub async fn status_notification(
        &self,
        station_id: &StationId,
        connector_id: ConnectorId,
        status: &str,
        error_code: Option<&str>,
    ) -> AppResult<()> {
        let handle = self
            .stations
            .get(station_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| {
                AppError::station_unreachable(format!("Station {station_id} is not registered"))
            })?;
        if !handle.is_connected() {
            return Err(AppError::station_unreachable(format!(
                "Station {station_id} is offline"
            )));
        }

        let payload = StatusNotificationRequest {
            connector_id: connector_id.as_i32(),
            status: status.to_string(),
            error_code: error_code.map(str::to_string),
            timestamp: Utc::now(),
        };
        let call = Call::new(Action::StatusNotification, payload).map_err(AppError::from)?;
        let frame = OcppMessage::Call(call).to_frame().map_err(AppError::from)?;
        if !handle.send_frame(frame).await {
            return Err(AppError::station_unreachable(format!(
                "Station {station_id} is offline"
            )));
        }
        debug!(station_id = %station_id, connector_id = %connector_id, status = %status, "StatusNotification sent");
        Ok(())
    }

    /// Ask the station for a heartbeat and return its reported time.
    pub async fn heartbeat(&self, station_id: &StationId) -> AppResult<DateTime<Utc>> {
        let response: HeartbeatResponse = self
            .request(station_id, Action::Heartbeat, HeartbeatRequest {})
            .await?;
        Ok(response.current_time)
    }

    /// Send one typed request and await its correlated response.
    async fn request<Req, Resp>(
        &self,
        station_id: &StationId,
        action: Action,
        payload: Req,
    ) -> AppResult<Resp>
    where
        Req: serde::Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let value = self.request_raw(station_id, action, payload).await?;
        serde_json::from_value(value).map_err(AppError::from)
    }

    async fn request_raw(
        &self,
        station_id: &StationId,
        action: Action,
        payload: impl serde::Serialize,
    ) -> AppResult<Value> {
        // Clone the handle out so no map guard is held across awaits.
        let handle = self
            .stations
            .get(station_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| {
                AppError::station_unreachable(format!("Station {station_id} is not registered"))
            })?;

        if !handle.is_connected() {
            return Err(AppError::station_unreachable(format!(
                "Station {station_id} is offline"
            )));
        }

        let call = Call::new(action, payload).map_err(AppError::from)?;
        let message_id = call.message_id.clone();
        let frame = OcppMessage::Call(call).to_frame().map_err(AppError::from)?;

        let reply_rx = handle.pending().register(message_id.clone());
        if !handle.send_frame(frame).await {
            handle.pending().discard(&message_id);
            return Err(AppError::station_unreachable(format!(
                "Station {station_id} is offline"
            )));
        }
        debug!(station_id = %station_id, action = %action, message_id = %message_id, "Request sent");

        match timeout(self.config.request_timeout(), reply_rx).await {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(gateway_error))) => Err(AppError::from(gateway_error)),
            // Connection task dropped the sender without replying.
            Ok(Err(_)) => Err(AppError::station_unreachable(format!(
                "Station {station_id} dropped the connection"
            ))),
            Err(_) => {
                handle.pending().discard(&message_id);
                Err(AppError::protocol_timeout(format!(
                    "Station {station_id} did not answer {action} within {:?}",
                    self.config.request_timeout()
                )))
            }
        }
    }

    /// Signal every connection task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
