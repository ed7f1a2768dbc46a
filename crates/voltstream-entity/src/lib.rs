//! # voltstream-entity
//!
//! Domain entity models: charging sessions, their lifecycle states, and
//! connectors. Entities are plain serializable structs; all mutation goes
//! through the session registry actors in `voltstream-session`.

pub mod connector;
pub mod session;

pub use connector::{Connector, ConnectorStatus};
pub use session::{ProgressUpdate, Session, SessionStatus, SessionSummary, StopReason};
