//! Shared primitive types.

pub mod id;

pub use id::{ConnectorId, SessionId, StationId, UserId, VehicleId};
