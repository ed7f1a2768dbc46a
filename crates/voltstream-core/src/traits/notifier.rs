//! Notification collaborator interface.

use async_trait::async_trait;

use crate::types::id::UserId;

/// Delivers user-facing notifications (email/SMS/push).
///
/// Fire-and-forget from the core's perspective: failures are logged by
/// the implementation and never retried here.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Send a notification of `event_type` to the user.
    async fn notify(&self, user_id: UserId, event_type: &str, payload: serde_json::Value);
}
