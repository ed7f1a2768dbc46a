//! Charging session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use voltstream_core::types::id::{ConnectorId, SessionId, StationId, UserId, VehicleId};

use super::status::SessionStatus;

/// Round a monetary or energy figure to 2 decimal digits.
pub fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A charging session.
///
/// Created by the session service on a validated start request and mutated
/// exclusively through its registry actor. A durable record is written to
/// the external store at every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// The user who started the session.
    pub user_id: UserId,
    /// The station hosting the session.
    pub station_id: StationId,
    /// The connector in use.
    pub connector_id: ConnectorId,
    /// The vehicle being charged, when known.
    pub vehicle_id: Option<VehicleId>,

    /// Current lifecycle state.
    pub status: SessionStatus,

    // -- Timing --
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// When the session reached a terminal state. Set exactly once.
    pub ended_at: Option<DateTime<Utc>>,

    // -- Metrics --
    /// Cumulative energy delivered in kWh. Never decreases.
    pub energy_delivered_kwh: f64,
    /// Most recent instantaneous power in kW.
    pub current_power_kw: f64,
    /// Peak power observed in kW.
    pub max_power_kw: f64,
    /// Average power over the session, derived at stop.
    pub avg_power_kw: Option<f64>,
    /// Total duration in seconds, derived at stop.
    pub duration_seconds: Option<i64>,

    // -- Money --
    /// Final cost, set at stop.
    pub cost_amount: Option<f64>,
    /// Cost currency code, set at stop.
    pub cost_currency: Option<String>,

    // -- Protocol correlation --
    /// Station-assigned transaction ID from StartTransaction.
    pub provider_transaction_id: Option<i32>,

    // -- Fault info --
    /// Fault code, present only in failed states.
    pub error_code: Option<String>,
    /// Fault message, present only in failed states.
    pub error_message: Option<String>,

    /// Set when a forced stop could not be confirmed by the station and
    /// awaits reconciliation.
    pub unconfirmed_by_station: bool,

    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session in INITIATING.
    pub fn new(
        user_id: UserId,
        station_id: StationId,
        connector_id: ConnectorId,
        vehicle_id: Option<VehicleId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            user_id,
            station_id,
            connector_id,
            vehicle_id,
            status: SessionStatus::Initiating,
            started_at: now,
            ended_at: None,
            energy_delivered_kwh: 0.0,
            current_power_kw: 0.0,
            max_power_kw: 0.0,
            avg_power_kw: None,
            duration_seconds: None,
            cost_amount: None,
            cost_currency: None,
            provider_transaction_id: None,
            error_code: None,
            error_message: None,
            unconfirmed_by_station: false,
            updated_at: now,
        }
    }

    /// Whether the session has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether any energy has been delivered yet.
    pub fn has_delivered_energy(&self) -> bool {
        self.energy_delivered_kwh > 0.0
    }

    /// Derive final metrics when entering a terminal state.
    ///
    /// Computes duration, average power, and (for COMPLETED sessions)
    /// cost from the flat tariff. `ended_at` is set here and never again.
    pub fn finalize_metrics(&mut self, price_per_kwh: f64, currency: &str) {
        let ended_at = Utc::now();
        self.ended_at = Some(ended_at);

        let duration = (ended_at - self.started_at).num_seconds().max(0);
        self.duration_seconds = Some(duration);

        let avg = if duration == 0 {
            0.0
        } else {
            self.energy_delivered_kwh / (duration as f64 / 3600.0)
        };
        self.avg_power_kw = Some(round_2dp(avg));
        self.energy_delivered_kwh = round_2dp(self.energy_delivered_kwh);

        if self.status == SessionStatus::Completed {
            self.cost_amount = Some(round_2dp(self.energy_delivered_kwh * price_per_kwh));
            self.cost_currency = Some(currency.to_string());
        }
        self.updated_at = ended_at;
    }
}

/// A partial telemetry/state update applied to a non-terminal session.
///
/// Updates that would regress `energy_delivered_kwh` are rejected by the
/// session actor, which protects against reordering from a lossy
/// transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// New lifecycle state, if the update carries one.
    pub status: Option<SessionStatus>,
    /// Cumulative energy delivered in kWh.
    pub energy_delivered_kwh: Option<f64>,
    /// Instantaneous power in kW.
    pub current_power_kw: Option<f64>,
    /// Reported temperature in °C.
    pub temperature_celsius: Option<f64>,
    /// Station error code accompanying the sample.
    pub error_code: Option<String>,
    /// Station error message accompanying the sample.
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> Session {
        Session::new(
            UserId::new(),
            StationId::new("ST-0001"),
            ConnectorId::new(1),
            None,
        )
    }

    #[test]
    fn test_new_session_is_initiating() {
        let session = sample_session();
        assert_eq!(session.status, SessionStatus::Initiating);
        assert!(!session.is_terminal());
        assert!(session.ended_at.is_none());
        assert_eq!(session.energy_delivered_kwh, 0.0);
    }

    #[test]
    fn test_finalize_zero_duration_has_zero_avg_power() {
        let mut session = sample_session();
        session.status = SessionStatus::Completed;
        session.finalize_metrics(0.42, "EUR");
        assert_eq!(session.avg_power_kw, Some(0.0));
        assert!(session.ended_at.is_some());
        assert_eq!(session.duration_seconds, Some(0));
    }

    #[test]
    fn test_finalize_computes_cost_for_completed() {
        let mut session = sample_session();
        session.energy_delivered_kwh = 10.0;
        session.status = SessionStatus::Completed;
        session.finalize_metrics(0.30, "EUR");
        assert_eq!(session.cost_amount, Some(3.0));
        assert_eq!(session.cost_currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_finalize_skips_cost_for_failed() {
        let mut session = sample_session();
        session.energy_delivered_kwh = 5.0;
        session.status = SessionStatus::Failed;
        session.finalize_metrics(0.30, "EUR");
        assert!(session.cost_amount.is_none());
        assert!(session.ended_at.is_some());
    }

    #[test]
    fn test_round_2dp() {
        assert_eq!(round_2dp(1.006), 1.01);
        assert_eq!(round_2dp(2.344), 2.34);
        assert_eq!(round_2dp(10.0 / 3.0), 3.33);
    }
}
