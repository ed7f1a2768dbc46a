//! Real-time broadcaster configuration.

use serde::{Deserialize, Serialize};

/// Real-time broadcaster configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Outbound event buffer size per subscriber.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer_size: usize,
    /// Maximum topic subscriptions per client connection.
    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions_per_connection: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer_size: default_subscriber_buffer(),
            max_subscriptions_per_connection: default_max_subscriptions(),
        }
    }
}

fn default_subscriber_buffer() -> usize {
    256
}

fn default_max_subscriptions() -> usize {
    50
}
