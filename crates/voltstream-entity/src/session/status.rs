//! Session lifecycle states and the transition table.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a charging session.
///
/// Non-terminal states are `Initiating`, `Starting`, `Charging`, and
/// `ChargingPaused`; everything else is terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Created; authorization exchange in flight.
    Initiating,
    /// Authorized; StartTransaction exchange in flight.
    Starting,
    /// Energy is being delivered.
    Charging,
    /// Delivery suspended at the user's request.
    ChargingPaused,
    /// Finished normally with final metrics derived.
    Completed,
    /// Terminated by a protocol or technical failure.
    Failed,
    /// Cancelled by the user before any energy was delivered.
    Cancelled,
    /// Expired because the station went silent past the deadline.
    Expired,
}

impl SessionStatus {
    /// Whether this state ends the lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Encodes the transition table: terminal states accept nothing, and
    /// every non-terminal state may expire.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (s, _) if s.is_terminal() => false,
            (_, Expired) => true,
            (Initiating, Starting) => true,
            (Initiating, Failed) => true,
            (Initiating, Cancelled) => true,
            (Starting, Charging) => true,
            (Starting, Failed) => true,
            (Starting, Cancelled) => true,
            (Charging, ChargingPaused) => true,
            (Charging, Completed) => true,
            (Charging, Failed) => true,
            (Charging, Cancelled) => true,
            (ChargingPaused, Charging) => true,
            (ChargingPaused, Completed) => true,
            (ChargingPaused, Failed) => true,
            (ChargingPaused, Cancelled) => true,
            _ => false,
        }
    }

    /// The state name as exposed in events and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiating => "INITIATING",
            Self::Starting => "STARTING",
            Self::Charging => "CHARGING",
            Self::ChargingPaused => "CHARGING_PAUSED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a session stop was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The user asked to stop.
    UserRequest,
    /// The vehicle reported a full battery.
    VehicleComplete,
    /// A configured energy limit was reached.
    EnergyLimit,
    /// A configured time limit was reached.
    TimeLimit,
    /// Emergency stop.
    EmergencyStop,
    /// A technical fault on the station side.
    TechnicalError,
    /// A grid-level failure.
    GridFailure,
}

impl StopReason {
    /// The protocol reason string sent in StopTransaction.
    pub fn as_protocol_str(&self) -> &'static str {
        match self {
            Self::UserRequest => "Local",
            Self::VehicleComplete => "EVDisconnected",
            Self::EnergyLimit => "Other",
            Self::TimeLimit => "Other",
            Self::EmergencyStop => "EmergencyStop",
            Self::TechnicalError => "PowerLoss",
            Self::GridFailure => "PowerLoss",
        }
    }

    /// Whether this reason should terminate the session as FAILED
    /// rather than COMPLETED.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::TechnicalError | Self::GridFailure)
    }
}
