//! Per-station connection task.
//!
//! Each registered station gets one task owning its transport. The task
//! multiplexes outbound frames from a queue with inbound frames from the
//! transport, acknowledges station-initiated CALLs inline, and routes
//! CALLRESULT/CALLERROR frames to the pending-request table. When the
//! transport drops it fails all in-flight requests and reconnects with
//! exponential backoff and jitter, indefinitely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use voltstream_core::config::gateway::GatewayConfig;
use voltstream_core::types::id::{ConnectorId, StationId};

use crate::inbound::InboundEvent;
use crate::message::{
    Action, Call, CallError, CallResult, OcppMessage, ProtocolErrorCode,
};
use crate::payloads::{HeartbeatRequest, MeterValuesRequest, StatusNotificationRequest};
use crate::pending::PendingTable;
use crate::transport::{StationTransport, TransportConnector};

/// Cloneable handle to a running station connection.
#[derive(Clone)]
pub struct StationHandle {
    pub station_id: StationId,
    outgoing_tx: mpsc::Sender<String>,
    pending: Arc<PendingTable>,
    connected: Arc<AtomicBool>,
    last_seen: Arc<RwLock<DateTime<Utc>>>,
}

impl StationHandle {
    /// Whether the transport is currently up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// When a frame was last received from this station.
    pub fn last_seen(&self) -> DateTime<Utc> {
        match self.last_seen.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// The pending-request table shared with the connection task.
    pub fn pending(&self) -> &Arc<PendingTable> {
        &self.pending
    }

    /// Queue a frame for the connection task to send.
    pub async fn send_frame(&self, frame: String) -> bool {
        self.outgoing_tx.send(frame).await.is_ok()
    }
}

/// Spawn the connection task for one station and return its handle.
pub fn spawn_connection(
    station_id: StationId,
    connector: Arc<dyn TransportConnector>,
    config: GatewayConfig,
    inbound_tx: mpsc::Sender<InboundEvent>,
    shutdown: watch::Receiver<bool>,
) -> StationHandle {
    let (outgoing_tx, outgoing_rx) = mpsc::channel(config.send_buffer_size);
    let handle = StationHandle {
        station_id: station_id.clone(),
        outgoing_tx,
        pending: Arc::new(PendingTable::new()),
        connected: Arc::new(AtomicBool::new(false)),
        last_seen: Arc::new(RwLock::new(Utc::now())),
    };

    let task = ConnectionTask {
        station_id,
        connector,
        config,
        pending: Arc::clone(&handle.pending),
        connected: Arc::clone(&handle.connected),
        last_seen: Arc::clone(&handle.last_seen),
        inbound_tx,
    };
    tokio::spawn(task.run(outgoing_rx, shutdown));

    handle
}

struct ConnectionTask {
    station_id: StationId,
    connector: Arc<dyn TransportConnector>,
    config: GatewayConfig,
    pending: Arc<PendingTable>,
    connected: Arc<AtomicBool>,
    last_seen: Arc<RwLock<DateTime<Utc>>>,
    inbound_tx: mpsc::Sender<InboundEvent>,
}

impl ConnectionTask {
    async fn run(self, mut outgoing_rx: mpsc::Receiver<String>, mut shutdown: watch::Receiver<bool>) {
        let mut delay = self.config.reconnect_delay();

        loop {
            let mut transport = tokio::select! {
                result = self.connector.connect(&self.station_id) => match result {
                    Ok(transport) => transport,
                    Err(error) => {
                        warn!(
                            station_id = %self.station_id,
                            error = %error,
                            retry_in = ?delay,
                            "Station connection attempt failed"
                        );
                        if Self::backoff(&mut delay, self.config.max_reconnect_delay(), &mut shutdown).await {
                            return;
                        }
                        continue;
                    }
                },
                _ = shutdown.changed() => return,
            };

            info!(station_id = %self.station_id, "Station transport established");
            delay = self.config.reconnect_delay();
            self.connected.store(true, Ordering::SeqCst);
            self.touch();
            self.dispatch(InboundEvent::StationConnected {
                station_id: self.station_id.clone(),
            });

            let stop = self.exchange(&mut transport, &mut outgoing_rx, &mut shutdown).await;

            self.connected.store(false, Ordering::SeqCst);
            self.pending.fail_all();
            self.dispatch(InboundEvent::StationDisconnected {
                station_id: self.station_id.clone(),
            });

            if stop {
                return;
            }
            warn!(
                station_id = %self.station_id,
                retry_in = ?delay,
                "Station transport dropped, reconnecting"
            );
            if Self::backoff(&mut delay, self.config.max_reconnect_delay(), &mut shutdown).await {
                return;
            }
        }
    }

    /// Pump frames both ways until the transport drops. Returns true when
    /// the task should stop entirely (shutdown or all handles dropped).
    async fn exchange(
        &self,
        transport: &mut Box<dyn StationTransport>,
        outgoing_rx: &mut mpsc::Receiver<String>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            tokio::select! {
                frame = outgoing_rx.recv() => match frame {
                    Some(frame) => {
                        if let Err(error) = transport.send(frame).await {
                            warn!(station_id = %self.station_id, error = %error, "Send failed");
                            return false;
                        }
                    }
                    // All handles dropped; nothing left to do.
                    None => return true,
                },
                frame = transport.recv() => match frame {
                    Some(frame) => self.handle_frame(transport, &frame).await,
                    None => return false,
                },
                _ = shutdown.changed() => return true,
            }
        }
    }

    async fn handle_frame(&self, transport: &mut Box<dyn StationTransport>, frame: &str) {
        self.touch();
        match OcppMessage::parse(frame) {
            Ok(OcppMessage::Call(call)) => self.handle_call(transport, call).await,
            Ok(OcppMessage::CallResult(result)) => {
                if !self.pending.complete(&result.message_id, result.payload) {
                    debug!(
                        station_id = %self.station_id,
                        message_id = %result.message_id,
                        "Unsolicited CALLRESULT ignored"
                    );
                }
            }
            Ok(OcppMessage::CallError(error)) => {
                if !self.pending.complete_error(
                    &error.message_id,
                    error.error_code,
                    error.error_description,
                    error.error_details,
                ) {
                    debug!(
                        station_id = %self.station_id,
                        message_id = %error.message_id,
                        "Unsolicited CALLERROR ignored"
                    );
                }
            }
            Err(error) => {
                // Malformed frames are logged and dropped; the connection
                // itself stays up.
                warn!(
                    station_id = %self.station_id,
                    error = %error,
                    "Dropping malformed frame"
                );
            }
        }
    }

    async fn handle_call(&self, transport: &mut Box<dyn StationTransport>, call: Call) {
        let now = Utc::now();
        let reply = match self.build_event(&call, now) {
            Ok(event) => {
                if let Some(event) = event {
                    self.dispatch(event);
                }
                let ack = match call.action {
                    Action::Heartbeat => serde_json::json!({ "currentTime": now }),
                    Action::BootNotification => serde_json::json!({
                        "currentTime": now,
                        "interval": 300,
                        "status": "Accepted",
                    }),
                    _ => serde_json::json!({}),
                };
                OcppMessage::CallResult(CallResult {
                    message_id: call.message_id,
                    payload: ack,
                })
            }
            Err(description) => OcppMessage::CallError(CallError {
                message_id: call.message_id,
                error_code: ProtocolErrorCode::FormatViolation,
                error_description: description,
                error_details: serde_json::json!({}),
            }),
        };

        match reply.to_frame() {
            Ok(frame) => {
                if let Err(error) = transport.send(frame).await {
                    warn!(station_id = %self.station_id, error = %error, "Ack send failed");
                }
            }
            Err(error) => {
                warn!(station_id = %self.station_id, error = %error, "Ack serialization failed");
            }
        }
    }

    /// Parse a station-initiated CALL into a typed event. `Ok(None)` means
    /// the action is acknowledged but carries nothing for the session layer
    /// (BootNotification, Authorize echoes).
    fn build_event(
        &self,
        call: &Call,
        now: DateTime<Utc>,
    ) -> Result<Option<InboundEvent>, String> {
        match call.action {
            Action::StatusNotification => {
                let payload: StatusNotificationRequest =
                    serde_json::from_value(call.payload.clone())
                        .map_err(|e| format!("invalid StatusNotification payload: {e}"))?;
                Ok(Some(InboundEvent::StatusNotification {
                    station_id: self.station_id.clone(),
                    connector_id: ConnectorId::new(payload.connector_id),
                    status: payload.status,
                    error_code: payload.error_code,
                    timestamp: payload.timestamp,
                }))
            }
            Action::MeterValues => {
                let payload: MeterValuesRequest = serde_json::from_value(call.payload.clone())
                    .map_err(|e| format!("invalid MeterValues payload: {e}"))?;
                let timestamp = payload
                    .meter_value
                    .first()
                    .map(|mv| mv.timestamp)
                    .unwrap_or(now);
                Ok(Some(InboundEvent::MeterValues {
                    station_id: self.station_id.clone(),
                    connector_id: ConnectorId::new(payload.connector_id),
                    transaction_id: payload.transaction_id,
                    energy_wh: payload.energy_wh(),
                    power_w: payload.power_w(),
                    temperature_celsius: payload.temperature_celsius(),
                    timestamp,
                }))
            }
            Action::Heartbeat => {
                let _: HeartbeatRequest = serde_json::from_value(call.payload.clone())
                    .map_err(|e| format!("invalid Heartbeat payload: {e}"))?;
                Ok(Some(InboundEvent::Heartbeat {
                    station_id: self.station_id.clone(),
                    timestamp: now,
                }))
            }
            _ => Ok(None),
        }
    }

    fn dispatch(&self, event: InboundEvent) {
        // The read loop never blocks on a slow consumer; a full queue
        // drops the event with a warning.
        if let Err(error) = self.inbound_tx.try_send(event) {
            warn!(
                station_id = %self.station_id,
                error = %error,
                "Inbound event queue full, dropping event"
            );
        }
    }

    fn touch(&self) {
        let now = Utc::now();
        match self.last_seen.write() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    /// Sleep the current backoff delay (with jitter), then double it up to
    /// the cap. Returns true when shutdown was signalled during the wait.
    async fn backoff(
        delay: &mut Duration,
        max_delay: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let jitter_ms = {
            let mut rng = rand::thread_rng();
            rng.gen_range(0..=delay.as_millis().max(1) as u64 / 4)
        };
        let wait = *delay + Duration::from_millis(jitter_ms);
        *delay = (*delay * 2).min(max_delay);

        tokio::select! {
            _ = tokio::time::sleep(wait) => false,
            _ = shutdown.changed() => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelConnector, ChannelTransport};

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            request_timeout_seconds: 1,
            reconnect_delay_seconds: 1,
            max_reconnect_delay_seconds: 2,
            send_buffer_size: 8,
            inbound_buffer_size: 32,
            ..GatewayConfig::default()
        }
    }

    fn spawn_with_station(
        station_id: &str,
    ) -> (
        StationHandle,
        crate::transport::StationSide,
        mpsc::Receiver<InboundEvent>,
        watch::Sender<bool>,
    ) {
        let (transport, station) = ChannelTransport::pair(16);
        let connector = Arc::new(ChannelConnector::new(vec![transport]));
        let (inbound_tx, inbound_rx) = mpsc::channel(32);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_connection(
            StationId::new(station_id),
            connector,
            test_config(),
            inbound_tx,
            shutdown_rx,
        );
        (handle, station, inbound_rx, shutdown_tx)
    }

    #[tokio::test]
    async fn test_connect_emits_station_connected() {
        let (handle, _station, mut inbound_rx, _shutdown) = spawn_with_station("ST-1");

        let event = inbound_rx.recv().await.expect("event");
        assert!(matches!(event, InboundEvent::StationConnected { .. }));
        assert!(handle.is_connected());
    }

    #[tokio::test]
    async fn test_heartbeat_call_is_acked_with_current_time() {
        let (_handle, mut station, mut inbound_rx, _shutdown) = spawn_with_station("ST-2");
        let _ = inbound_rx.recv().await; // StationConnected

        station
            .to_gateway
            .send(r#"[2,"hb-1","Heartbeat",{}]"#.to_string())
            .await
            .expect("send");

        let reply = station.from_gateway.recv().await.expect("reply");
        let value: serde_json::Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(value[0], 3);
        assert_eq!(value[1], "hb-1");
        assert!(value[2].get("currentTime").is_some());

        let event = inbound_rx.recv().await.expect("event");
        assert!(matches!(event, InboundEvent::Heartbeat { .. }));
    }

    #[tokio::test]
    async fn test_status_notification_dispatched_as_typed_event() {
        let (_handle, mut station, mut inbound_rx, _shutdown) = spawn_with_station("ST-3");
        let _ = inbound_rx.recv().await; // StationConnected

        let frame = r#"[2,"sn-1","StatusNotification",{"connectorId":2,"status":"Charging","timestamp":"2026-08-28T10:00:00Z"}]"#;
        station
            .to_gateway
            .send(frame.to_string())
            .await
            .expect("send");

        match inbound_rx.recv().await.expect("event") {
            InboundEvent::StatusNotification {
                connector_id,
                status,
                ..
            } => {
                assert_eq!(connector_id, ConnectorId::new(2));
                assert_eq!(status, "Charging");
            }
            other => panic!("expected StatusNotification, got {other:?}"),
        }
        // Ack still goes out.
        let reply = station.from_gateway.recv().await.expect("reply");
        assert!(reply.starts_with("[3,"));
    }

    #[tokio::test]
    async fn test_malformed_call_gets_call_error() {
        let (_handle, mut station, mut inbound_rx, _shutdown) = spawn_with_station("ST-4");
        let _ = inbound_rx.recv().await; // StationConnected

        let frame = r#"[2,"bad-1","MeterValues",{"connectorId":"not-a-number"}]"#;
        station
            .to_gateway
            .send(frame.to_string())
            .await
            .expect("send");

        let reply = station.from_gateway.recv().await.expect("reply");
        let value: serde_json::Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(value[0], 4);
        assert_eq!(value[1], "bad-1");
        assert_eq!(value[2], "FormatViolation");
    }

    #[tokio::test]
    async fn test_transport_drop_fails_pending_and_flips_connected() {
        let (handle, station, mut inbound_rx, _shutdown) = spawn_with_station("ST-5");
        let _ = inbound_rx.recv().await; // StationConnected

        let rx = handle.pending().register("req-1".to_string());
        drop(station);

        let event = inbound_rx.recv().await.expect("event");
        assert!(matches!(event, InboundEvent::StationDisconnected { .. }));
        let reply = rx.await.expect("reply");
        assert!(matches!(reply, Err(crate::message::GatewayError::Unreachable)));
        assert!(!handle.is_connected());
    }
}
