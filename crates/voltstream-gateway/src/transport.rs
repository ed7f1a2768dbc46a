//! Pluggable station transports.
//!
//! The gateway is transport-agnostic: a station connection only needs a
//! bidirectional text-frame stream. Production uses WebSocket; tests use
//! an in-memory channel pair.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use voltstream_core::types::id::StationId;

use crate::message::GatewayError;

/// A connected bidirectional text-frame stream to one station.
#[async_trait]
pub trait StationTransport: Send + 'static {
    /// Send one frame. Errors mean the transport is no longer usable.
    async fn send(&mut self, frame: String) -> Result<(), GatewayError>;

    /// Receive the next frame. `None` means the transport closed.
    async fn recv(&mut self) -> Option<String>;
}

/// Establishes transports for stations; one implementation per backend
/// (WebSocket endpoint, message-queue topic, in-memory test pair).
#[async_trait]
pub trait TransportConnector: Send + Sync + 'static {
    async fn connect(
        &self,
        station_id: &StationId,
    ) -> Result<Box<dyn StationTransport>, GatewayError>;
}

// ---------------------------------------------------------------------------
// WebSocket transport
// ---------------------------------------------------------------------------

/// Connects to stations over WebSocket at `<base_url>/<station_id>`.
pub struct WebSocketConnector {
    base_url: String,
}

impl WebSocketConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Build the per-station URL.
    pub fn station_url(&self, station_id: &StationId) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), station_id)
    }
}

#[async_trait]
impl TransportConnector for WebSocketConnector {
    async fn connect(
        &self,
        station_id: &StationId,
    ) -> Result<Box<dyn StationTransport>, GatewayError> {
        let url = self.station_url(station_id);
        debug!(station_id = %station_id, url = %url, "Dialing station WebSocket");
        let (stream, _) = connect_async(&url)
            .await
            .map_err(|_| GatewayError::Unreachable)?;
        Ok(Box::new(WebSocketTransport { stream }))
    }
}

/// WebSocket-backed transport.
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

#[async_trait]
impl StationTransport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), GatewayError> {
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(|_| GatewayError::ConnectionClosed)
    }

    async fn recv(&mut self) -> Option<String> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(text.to_string()),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue, // ping/pong/binary
                Err(_) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory channel transport (tests, simulators)
// ---------------------------------------------------------------------------

/// In-memory transport half held by the gateway.
pub struct ChannelTransport {
    tx: mpsc::Sender<String>,
    rx: mpsc::Receiver<String>,
}

/// The station side of an in-memory pair, used by tests to script a
/// station's behavior.
pub struct StationSide {
    /// Frames the gateway sent to the station.
    pub from_gateway: mpsc::Receiver<String>,
    /// Frames the station sends back to the gateway.
    pub to_gateway: mpsc::Sender<String>,
}

impl ChannelTransport {
    /// Create a connected transport/station pair.
    pub fn pair(buffer: usize) -> (ChannelTransport, StationSide) {
        let (gw_tx, station_rx) = mpsc::channel(buffer);
        let (station_tx, gw_rx) = mpsc::channel(buffer);
        (
            ChannelTransport {
                tx: gw_tx,
                rx: gw_rx,
            },
            StationSide {
                from_gateway: station_rx,
                to_gateway: station_tx,
            },
        )
    }
}

#[async_trait]
impl StationTransport for ChannelTransport {
    async fn send(&mut self, frame: String) -> Result<(), GatewayError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| GatewayError::ConnectionClosed)
    }

    async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Connector that hands out pre-built in-memory transports, one per
/// `connect` call, in registration order.
pub struct ChannelConnector {
    transports: tokio::sync::Mutex<Vec<ChannelTransport>>,
}

impl ChannelConnector {
    pub fn new(transports: Vec<ChannelTransport>) -> Self {
        Self {
            transports: tokio::sync::Mutex::new(transports),
        }
    }
}

#[async_trait]
impl TransportConnector for ChannelConnector {
    async fn connect(
        &self,
        _station_id: &StationId,
    ) -> Result<Box<dyn StationTransport>, GatewayError> {
        let mut transports = self.transports.lock().await;
        if transports.is_empty() {
            return Err(GatewayError::Unreachable);
        }
        Ok(Box::new(transports.remove(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_url_joins_cleanly() {
        let connector = WebSocketConnector::new("ws://csms.example/ocpp/");
        let url = connector.station_url(&StationId::new("ST-0042"));
        assert_eq!(url, "ws://csms.example/ocpp/ST-0042");
    }

    #[tokio::test]
    async fn test_channel_pair_roundtrip() {
        let (mut transport, mut station) = ChannelTransport::pair(8);

        transport.send("hello".to_string()).await.expect("send");
        assert_eq!(station.from_gateway.recv().await.as_deref(), Some("hello"));

        station
            .to_gateway
            .send("world".to_string())
            .await
            .expect("send");
        assert_eq!(transport.recv().await.as_deref(), Some("world"));
    }

    #[tokio::test]
    async fn test_channel_transport_closes() {
        let (mut transport, station) = ChannelTransport::pair(8);
        drop(station);
        assert!(transport.recv().await.is_none());
        assert!(transport.send("x".to_string()).await.is_err());
    }
}
