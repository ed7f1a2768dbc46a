//! # voltstream-gateway
//!
//! The station protocol gateway. Maintains one logical connection per
//! charging station over a pluggable transport, frames and parses OCPP
//! messages, and correlates outbound requests to their responses by
//! message ID with a per-request timeout.
//!
//! Inbound CALLs from a station (StatusNotification, MeterValues,
//! Heartbeat) are dispatched as typed [`inbound::InboundEvent`]s without
//! blocking the connection's read loop.

pub mod connection;
pub mod gateway;
pub mod inbound;
pub mod message;
pub mod payloads;
pub mod pending;
pub mod transport;

pub use gateway::ProtocolGateway;
pub use inbound::InboundEvent;
pub use message::{Action, GatewayError, OcppMessage};
