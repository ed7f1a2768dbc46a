//! Shared test harness.
//!
//! Builds the full service stack in-process, with stations scripted over
//! the in-memory channel transport instead of real WebSockets.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use voltstream_core::config::gateway::GatewayConfig;
use voltstream_core::config::session::SessionConfig;
use voltstream_core::config::realtime::RealtimeConfig;
use voltstream_core::types::id::{ConnectorId, SessionId, StationId, UserId};
use voltstream_entity::connector::{Connector, ConnectorStatus};
use voltstream_gateway::transport::{ChannelConnector, ChannelTransport, StationSide};
use voltstream_gateway::ProtocolGateway;
use voltstream_realtime::Broadcaster;
use voltstream_session::{
    spawn_bridge, ConnectorOracle, SessionRegistry, SessionService, StartSessionRequest,
};
use voltstream_store::{
    InMemoryConnectorStore, InMemorySessionStore, LoggingNotifier, LoggingPaymentProvider,
};

/// The assembled stack plus the handles tests poke at.
pub struct TestApp {
    pub service: Arc<SessionService>,
    pub gateway: Arc<ProtocolGateway>,
    pub broadcaster: Arc<Broadcaster>,
    pub store: Arc<InMemorySessionStore>,
    // Held so the bridge keeps running for the test's lifetime.
    _shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    /// Build the stack with one transport per station, registered in order,
    /// and the given connectors seeded as the station inventory.
    pub async fn new(
        stations: &[&str],
        transports: Vec<ChannelTransport>,
        connectors: Vec<Connector>,
    ) -> Self {
        Self::with_session_config(stations, transports, connectors, SessionConfig::default())
            .await
    }

    /// Like [`TestApp::new`] with a custom session configuration, for
    /// tests tuning deadlines and limits.
    pub async fn with_session_config(
        stations: &[&str],
        transports: Vec<ChannelTransport>,
        connectors: Vec<Connector>,
        session_config: SessionConfig,
    ) -> Self {
        let gateway_config = GatewayConfig {
            request_timeout_seconds: 1,
            reconnect_delay_seconds: 1,
            max_reconnect_delay_seconds: 2,
            send_buffer_size: 16,
            inbound_buffer_size: 64,
            ..GatewayConfig::default()
        };

        let channel_connector = Arc::new(ChannelConnector::new(transports));
        let (gateway, inbound_rx) = ProtocolGateway::new(gateway_config, channel_connector);
        let gateway = Arc::new(gateway);

        // Sequential registration keeps the transport-to-station mapping
        // deterministic: the connector hands transports out in connect order.
        for station in stations {
            let station_id = StationId::new(*station);
            gateway.register_station(station_id.clone());
            wait_connected(&gateway, &station_id).await;
        }

        let registry = Arc::new(SessionRegistry::new(session_config.clone()));
        let oracle = Arc::new(ConnectorOracle::new(Arc::new(
            InMemoryConnectorStore::with_connectors(connectors),
        )));
        let broadcaster = Arc::new(Broadcaster::new(RealtimeConfig::default()));
        broadcaster.set_snapshot_source(Arc::clone(&registry) as _);
        let store = Arc::new(InMemorySessionStore::new());

        let service = Arc::new(SessionService::new(
            session_config,
            registry,
            oracle,
            Arc::clone(&gateway),
            Arc::clone(&store) as _,
            Arc::clone(&broadcaster),
            Arc::new(LoggingPaymentProvider),
            Arc::new(LoggingNotifier),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let _ = spawn_bridge(
            Arc::clone(&service),
            Arc::clone(&broadcaster),
            inbound_rx,
            shutdown_rx,
        );

        Self {
            service,
            gateway,
            broadcaster,
            store,
            _shutdown_tx: shutdown_tx,
        }
    }
}

/// An available connector record for seeding the oracle's store.
pub fn available_connector(station: &str, connector: i32) -> Connector {
    Connector {
        station_id: StationId::new(station),
        connector_id: ConnectorId::new(connector),
        connector_type: "Type2".to_string(),
        power_kw: 22.0,
        status: ConnectorStatus::Available,
        updated_at: Utc::now(),
    }
}

/// A start request for a fresh user.
pub fn start_request(station: &str, connector: i32) -> StartSessionRequest {
    StartSessionRequest {
        user_id: UserId::new(),
        station_id: StationId::new(station),
        connector_id: ConnectorId::new(connector),
        vehicle_id: None,
        id_tag: "TAG-TEST".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Station scripts
// ---------------------------------------------------------------------------

/// A scripted station running in the background.
pub struct StationScript {
    /// Sender for injecting station-originated CALLs (MeterValues, ...).
    pub to_gateway: mpsc::Sender<String>,
    handle: tokio::task::JoinHandle<()>,
}

impl StationScript {
    /// Kill the station: the transport drops and the gateway sees the
    /// connection go down.
    pub fn disconnect(self) {
        self.handle.abort();
    }
}

/// Script a station that accepts every exchange, assigning
/// `transaction_id` to started transactions.
pub fn accept_all(mut station: StationSide, transaction_id: i32) -> StationScript {
    let to_gateway = station.to_gateway.clone();
    let handle = tokio::spawn(async move {
        while let Some(frame) = station.from_gateway.recv().await {
            let value: Value = serde_json::from_str(&frame).expect("station received json");
            if value[0] != 2 {
                continue;
            }
            let message_id = value[1].as_str().expect("message id");
            let payload = match value[2].as_str().unwrap_or_default() {
                "Authorize" => serde_json::json!({ "idTagInfo": { "status": "Accepted" } }),
                "StartTransaction" => serde_json::json!({
                    "idTagInfo": { "status": "Accepted" },
                    "transactionId": transaction_id,
                }),
                "StopTransaction" => {
                    serde_json::json!({ "idTagInfo": { "status": "Accepted" } })
                }
                _ => serde_json::json!({}),
            };
            let reply = serde_json::json!([3, message_id, payload]);
            if station.to_gateway.send(reply.to_string()).await.is_err() {
                break;
            }
        }
    });
    StationScript { to_gateway, handle }
}

/// Script a station that swallows every CALL without answering.
pub fn silent(mut station: StationSide) -> StationScript {
    let to_gateway = station.to_gateway.clone();
    let handle = tokio::spawn(async move {
        while station.from_gateway.recv().await.is_some() {}
    });
    StationScript { to_gateway, handle }
}

/// A MeterValues CALL frame as a station would send it.
pub fn meter_values_frame(
    connector_id: i32,
    transaction_id: i32,
    energy_wh: f64,
    power_w: f64,
) -> String {
    serde_json::json!([
        2,
        Uuid::new_v4().to_string(),
        "MeterValues",
        {
            "connectorId": connector_id,
            "transactionId": transaction_id,
            "meterValue": [{
                "timestamp": Utc::now(),
                "sampledValue": [
                    {
                        "value": energy_wh.to_string(),
                        "measurand": "Energy.Active.Import.Register",
                        "unit": "Wh",
                    },
                    {
                        "value": power_w.to_string(),
                        "measurand": "Power.Active.Import",
                        "unit": "W",
                    },
                ],
            }],
        }
    ])
    .to_string()
}

// ---------------------------------------------------------------------------
// Polling waits
// ---------------------------------------------------------------------------

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const POLL_ATTEMPTS: usize = 300;

pub async fn wait_connected(gateway: &ProtocolGateway, station_id: &StationId) {
    for _ in 0..POLL_ATTEMPTS {
        if gateway.is_connected(station_id) {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    panic!("station {station_id} never connected");
}

pub async fn wait_disconnected(gateway: &ProtocolGateway, station_id: &StationId) {
    for _ in 0..POLL_ATTEMPTS {
        if !gateway.is_connected(station_id) {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    panic!("station {station_id} never disconnected");
}

/// Wait until the session reports at least `min_kwh` delivered energy.
pub async fn wait_for_energy(service: &SessionService, session_id: &SessionId, min_kwh: f64) {
    for _ in 0..POLL_ATTEMPTS {
        let session = service.get_session(session_id).await.expect("session");
        if session.energy_delivered_kwh >= min_kwh {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    panic!("session {session_id} never reached {min_kwh} kWh");
}
