//! # voltstream-session
//!
//! The session lifecycle layer: the connector availability oracle, the
//! session registry (one single-writer actor per live session), and the
//! [`service::SessionService`] that drives start/stop/pause/resume and
//! telemetry through the protocol gateway, the durable store, and the
//! real-time broadcaster.

pub mod inbound;
pub mod oracle;
pub mod ports;
pub mod registry;
pub mod service;

pub use inbound::spawn_bridge;
pub use oracle::ConnectorOracle;
pub use ports::{ConnectorStore, SessionStore};
pub use registry::SessionRegistry;
pub use service::{spawn_sweeper, SessionService, StartSessionRequest, StopSessionRequest};
