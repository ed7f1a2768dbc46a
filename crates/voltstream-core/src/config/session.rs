//! Charging session lifecycle configuration.

use serde::{Deserialize, Serialize};

/// Session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Whether a user may hold at most one non-terminal session.
    #[serde(default = "default_true")]
    pub single_session_per_user: bool,
    /// Hours a terminal session stays in the in-memory registry before
    /// its actor is retired.
    #[serde(default = "default_eviction_grace")]
    pub eviction_grace_hours: u64,
    /// Seconds of station silence after which non-terminal sessions on
    /// that station are expired.
    #[serde(default = "default_expiry_deadline")]
    pub expiry_deadline_seconds: u64,
    /// Interval between registry sweep passes, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Flat tariff applied at session stop.
    #[serde(default)]
    pub tariff: TariffConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            single_session_per_user: true,
            eviction_grace_hours: default_eviction_grace(),
            expiry_deadline_seconds: default_expiry_deadline(),
            sweep_interval_seconds: default_sweep_interval(),
            tariff: TariffConfig::default(),
        }
    }
}

/// Flat energy tariff. Billing and tax logic live outside this core;
/// this only produces the session's cost figure at stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffConfig {
    /// Price per delivered kWh.
    #[serde(default = "default_price_per_kwh")]
    pub price_per_kwh: f64,
    /// ISO 4217 currency code.
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            price_per_kwh: default_price_per_kwh(),
            currency: default_currency(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_eviction_grace() -> u64 {
    24
}

fn default_expiry_deadline() -> u64 {
    600
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_price_per_kwh() -> f64 {
    0.42
}

fn default_currency() -> String {
    "EUR".to_string()
}
