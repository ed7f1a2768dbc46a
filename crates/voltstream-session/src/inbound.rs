//! Bridge from gateway events to the session layer.
//!
//! Consumes the typed inbound stream produced by the station connections
//! and turns it into progress updates, connector status changes, and
//! station-topic events. Runs as one task; per-session ordering is then
//! guaranteed by the session actors' FIFO queues.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use voltstream_core::events::{ConnectorEvent, DomainEvent};
use voltstream_entity::connector::ConnectorStatus;
use voltstream_entity::session::{ProgressUpdate, SessionStatus};
use voltstream_gateway::InboundEvent;
use voltstream_realtime::{Broadcaster, Topic};

use crate::service::SessionService;

/// Spawn the bridge task. Stops when the gateway closes the stream or
/// shutdown is signalled.
pub fn spawn_bridge(
    service: Arc<SessionService>,
    broadcaster: Arc<Broadcaster>,
    mut inbound_rx: mpsc::Receiver<InboundEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = inbound_rx.recv() => match event {
                    Some(event) => handle_event(&service, &broadcaster, event).await,
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        debug!("Inbound bridge stopped");
    })
}

async fn handle_event(
    service: &SessionService,
    broadcaster: &Broadcaster,
    event: InboundEvent,
) {
    match event {
        InboundEvent::StationConnected { station_id } => {
            info!(station_id = %station_id, "Station online");
        }
        InboundEvent::StationDisconnected { station_id } => {
            info!(station_id = %station_id, "Station offline");
        }
        InboundEvent::Heartbeat { station_id, .. } => {
            debug!(station_id = %station_id, "Heartbeat");
        }
        InboundEvent::StatusNotification {
            station_id,
            connector_id,
            status,
            error_code,
            ..
        } => {
            let connector = match service
                .oracle()
                .apply_status_report(&station_id, connector_id, &status)
                .await
            {
                Ok(Some(connector)) => connector,
                Ok(None) => return,
                Err(error) => {
                    warn!(
                        station_id = %station_id,
                        connector_id = %connector_id,
                        error = %error,
                        "Status report failed"
                    );
                    return;
                }
            };
            broadcaster.publish(
                &Topic::Station(station_id.clone()),
                DomainEvent::Connector(ConnectorEvent::ConnectorStatusUpdate {
                    station_id: station_id.clone(),
                    connector_id,
                    status: connector.status.as_str().to_string(),
                    error_code: error_code.clone(),
                }),
            );

            // A faulted connector fails its live session.
            if connector.status == ConnectorStatus::OutOfService {
                if let Some(handle) = service.registry().for_connector(&station_id, connector_id)
                {
                    let update = ProgressUpdate {
                        status: Some(SessionStatus::Failed),
                        error_code: error_code.or_else(|| Some("connector_faulted".to_string())),
                        error_message: Some("Station reported a connector fault".to_string()),
                        ..Default::default()
                    };
                    if let Err(error) = service
                        .apply_progress_update(&handle.session_id, update)
                        .await
                    {
                        warn!(
                            session_id = %handle.session_id,
                            error = %error,
                            "Could not fail session after connector fault"
                        );
                    }
                }
            }
        }
        InboundEvent::MeterValues {
            station_id,
            connector_id,
            energy_wh,
            power_w,
            temperature_celsius,
            ..
        } => {
            let Some(handle) = service.registry().for_connector(&station_id, connector_id)
            else {
                debug!(
                    station_id = %station_id,
                    connector_id = %connector_id,
                    "Meter values with no live session"
                );
                return;
            };
            let update = ProgressUpdate {
                energy_delivered_kwh: energy_wh.map(|wh| wh / 1000.0),
                current_power_kw: power_w.map(|w| w / 1000.0),
                temperature_celsius,
                ..Default::default()
            };
            if let Err(error) = service
                .apply_progress_update(&handle.session_id, update)
                .await
            {
                warn!(
                    session_id = %handle.session_id,
                    error = %error,
                    "Progress update from meter values failed"
                );
            }
        }
    }
}
