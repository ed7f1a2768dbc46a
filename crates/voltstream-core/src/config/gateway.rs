//! Station protocol gateway configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Protocol gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// WebSocket endpoint stations are reachable at. The station identity
    /// is appended as the final path segment.
    #[serde(default = "default_station_endpoint")]
    pub station_endpoint: String,
    /// Stations to register at startup.
    #[serde(default)]
    pub stations: Vec<String>,
    /// Seconds to wait for a station's CALLRESULT before a request fails
    /// with a protocol timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Initial reconnect delay after a transport drop, in seconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_seconds: u64,
    /// Upper bound on the exponential reconnect backoff, in seconds.
    #[serde(default = "default_max_reconnect_delay")]
    pub max_reconnect_delay_seconds: u64,
    /// Outbound message queue depth per station connection.
    #[serde(default = "default_send_buffer")]
    pub send_buffer_size: usize,
    /// Inbound event queue depth shared by all stations.
    #[serde(default = "default_inbound_buffer")]
    pub inbound_buffer_size: usize,
}

impl GatewayConfig {
    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Initial reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_seconds)
    }

    /// Maximum reconnect delay as a [`Duration`].
    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.max_reconnect_delay_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            station_endpoint: default_station_endpoint(),
            stations: Vec::new(),
            request_timeout_seconds: default_request_timeout(),
            reconnect_delay_seconds: default_reconnect_delay(),
            max_reconnect_delay_seconds: default_max_reconnect_delay(),
            send_buffer_size: default_send_buffer(),
            inbound_buffer_size: default_inbound_buffer(),
        }
    }
}

fn default_station_endpoint() -> String {
    "ws://127.0.0.1:9000/ocpp".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_max_reconnect_delay() -> u64 {
    300
}

fn default_send_buffer() -> usize {
    64
}

fn default_inbound_buffer() -> usize {
    256
}
