//! # voltstream-realtime
//!
//! The real-time broadcaster. Clients subscribe to topics
//! (`session:<id>`, `station:<id>`, `user:<id>`) and receive the domain
//! event catalogue over bounded per-subscriber queues. Delivery is
//! best-effort: the authoritative state transition is committed before
//! publication, and dead subscribers are pruned on publish.

pub mod broadcaster;
pub mod frame;
pub mod snapshot;
pub mod subscriber;
pub mod topic;

pub use broadcaster::Broadcaster;
pub use frame::{EventPayload, OutboundFrame};
pub use snapshot::SnapshotSource;
pub use subscriber::Subscription;
pub use topic::Topic;
