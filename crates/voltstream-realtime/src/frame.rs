//! Frames delivered to topic subscribers.

use serde::{Deserialize, Serialize};

use voltstream_core::events::DomainEvent;
use voltstream_entity::session::Session;

/// Payload of a subscriber frame. Every variant carries a `type` field on
/// the wire so clients can dispatch without inspecting the topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// Current session state, sent as the first frame of a session-topic
    /// subscription before any live events.
    Snapshot(SnapshotEvent),
    /// A live catalogue event.
    Event(DomainEvent),
}

/// Snapshot wrapper giving the snapshot its own catalogue tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotEvent {
    /// Full state of a session at subscription time.
    SessionSnapshot {
        /// The session as currently held by its registry actor.
        session: Session,
    },
}

/// One frame delivered to a subscriber: the topic it matched plus the
/// event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Wire-form topic name (`session:<id>`, ...).
    pub topic: String,
    /// The event payload.
    pub event: EventPayload,
}

impl OutboundFrame {
    /// Frame for a live event on a topic.
    pub fn event(topic: String, event: DomainEvent) -> Self {
        Self {
            topic,
            event: EventPayload::Event(event),
        }
    }

    /// Frame for a session snapshot.
    pub fn snapshot(topic: String, session: Session) -> Self {
        Self {
            topic,
            event: EventPayload::Snapshot(SnapshotEvent::SessionSnapshot { session }),
        }
    }
}
