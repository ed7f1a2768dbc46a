//! Domain events published through the real-time broadcaster.

pub mod connector;
pub mod session;

use serde::{Deserialize, Serialize};

pub use connector::ConnectorEvent;
pub use session::{AlertSeverity, SessionEvent};

/// Any event the core can publish to a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainEvent {
    /// A session lifecycle or telemetry event.
    Session(SessionEvent),
    /// A connector state event.
    Connector(ConnectorEvent),
}

impl DomainEvent {
    /// The catalogue name of this event (`session_created`, ...).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Session(e) => e.event_type(),
            Self::Connector(e) => e.event_type(),
        }
    }
}

impl From<SessionEvent> for DomainEvent {
    fn from(event: SessionEvent) -> Self {
        Self::Session(event)
    }
}

impl From<ConnectorEvent> for DomainEvent {
    fn from(event: ConnectorEvent) -> Self {
        Self::Connector(event)
    }
}
