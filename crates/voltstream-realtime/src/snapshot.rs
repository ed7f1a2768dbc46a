//! Snapshot source for session-topic subscriptions.

use async_trait::async_trait;

use voltstream_core::types::id::SessionId;
use voltstream_entity::session::Session;

/// Supplies the current state of a session for snapshot-before-stream.
///
/// Implemented by the session registry; the broadcaster holds it behind
/// this trait so the realtime crate needs no knowledge of actors.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// The session's current state, or `None` when it is not live.
    async fn session_snapshot(&self, session_id: &SessionId) -> Option<Session>;
}
