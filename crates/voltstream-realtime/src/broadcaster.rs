//! Topic registry and fan-out.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use voltstream_core::config::realtime::RealtimeConfig;
use voltstream_core::events::DomainEvent;
use voltstream_core::AppResult;

use crate::frame::OutboundFrame;
use crate::snapshot::SnapshotSource;
use crate::subscriber::{Delivery, SubscriberHandle, Subscription};
use crate::topic::Topic;

/// The broadcaster: a concurrent topic → subscribers registry.
///
/// Publishing never blocks on a slow subscriber and never fails the
/// caller; a subscriber whose receive side is gone is removed during the
/// publish that discovers it.
pub struct Broadcaster {
    config: RealtimeConfig,
    topics: DashMap<String, Vec<SubscriberHandle>>,
    snapshot_source: RwLock<Option<Arc<dyn SnapshotSource>>>,
}

impl Broadcaster {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            config,
            topics: DashMap::new(),
            snapshot_source: RwLock::new(None),
        }
    }

    /// Attach the session snapshot source. Called once during wiring,
    /// after the registry exists.
    pub fn set_snapshot_source(&self, source: Arc<dyn SnapshotSource>) {
        if let Ok(mut guard) = self.snapshot_source.write() {
            *guard = Some(source);
        }
    }

    fn snapshot_source(&self) -> Option<Arc<dyn SnapshotSource>> {
        self.snapshot_source
            .read()
            .ok()
            .and_then(|guard| guard.clone())
    }

    /// Subscribe to a topic.
    ///
    /// For session topics the current session state is queued as the first
    /// frame, before the subscriber is visible to publishers, so the
    /// client always sees state before deltas.
    pub async fn subscribe(&self, topic: &Topic) -> AppResult<Subscription> {
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer_size);
        let id = Uuid::new_v4();
        let name = topic.name();

        if let Topic::Session(session_id) = topic {
            if let Some(source) = self.snapshot_source() {
                if let Some(session) = source.session_snapshot(session_id).await {
                    // Queue capacity is fresh, so this cannot fail.
                    let _ = tx.try_send(OutboundFrame::snapshot(name.clone(), session));
                }
            }
        }

        self.topics
            .entry(name.clone())
            .or_default()
            .push(SubscriberHandle::new(id, tx));
        debug!(topic = %name, subscriber_id = %id, "Subscribed");

        Ok(Subscription { id, rx })
    }

    /// Remove one subscriber from a topic.
    pub fn unsubscribe(&self, topic: &Topic, subscriber_id: Uuid) {
        let name = topic.name();
        let mut remove_topic = false;
        if let Some(mut handles) = self.topics.get_mut(&name) {
            handles.retain(|h| h.id != subscriber_id);
            remove_topic = handles.is_empty();
        }
        if remove_topic {
            self.topics.remove_if(&name, |_, handles| handles.is_empty());
        }
        debug!(topic = %name, subscriber_id = %subscriber_id, "Unsubscribed");
    }

    /// Publish an event to one topic. Returns the number of subscribers
    /// the frame was queued for.
    pub fn publish(&self, topic: &Topic, event: DomainEvent) -> usize {
        let name = topic.name();
        let Some(mut handles) = self.topics.get_mut(&name) else {
            trace!(topic = %name, event_type = event.event_type(), "No subscribers");
            return 0;
        };

        let mut sent = 0;
        handles.retain(|handle| {
            match handle.deliver(OutboundFrame::event(name.clone(), event.clone())) {
                Delivery::Sent => {
                    sent += 1;
                    true
                }
                Delivery::Lagged => true,
                Delivery::Dead => {
                    debug!(topic = %name, subscriber_id = %handle.id, "Pruning dead subscriber");
                    false
                }
            }
        });
        sent
    }

    /// Publish an event to several topics at once.
    pub fn publish_all(&self, topics: &[Topic], event: DomainEvent) -> usize {
        topics
            .iter()
            .map(|topic| self.publish(topic, event.clone()))
            .sum()
    }

    /// Number of subscribers currently attached to a topic.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .get(&topic.name())
            .map(|handles| handles.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use voltstream_core::events::SessionEvent;
    use voltstream_core::types::id::{ConnectorId, SessionId, StationId, UserId};
    use voltstream_entity::session::Session;

    use crate::frame::EventPayload;

    fn broadcaster() -> Broadcaster {
        Broadcaster::new(RealtimeConfig::default())
    }

    fn deleted_event(session_id: SessionId) -> DomainEvent {
        SessionEvent::SessionDeleted { session_id }.into()
    }

    #[tokio::test]
    async fn test_publish_reaches_topic_subscribers_only() {
        let broadcaster = broadcaster();
        let user_a = Topic::User(UserId::new());
        let user_b = Topic::User(UserId::new());

        let mut sub_a = broadcaster.subscribe(&user_a).await.expect("subscribe");
        let mut sub_b = broadcaster.subscribe(&user_b).await.expect("subscribe");

        let sent = broadcaster.publish(&user_a, deleted_event(SessionId::new()));
        assert_eq!(sent, 1);

        let frame = sub_a.recv().await.expect("frame");
        assert_eq!(frame.topic, user_a.name());
        assert!(sub_b.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_dead_subscriber_pruned_on_publish() {
        let broadcaster = broadcaster();
        let topic = Topic::Station(StationId::new("ST-1"));

        let sub = broadcaster.subscribe(&topic).await.expect("subscribe");
        let _kept = broadcaster.subscribe(&topic).await.expect("subscribe");
        assert_eq!(broadcaster.subscriber_count(&topic), 2);

        drop(sub);
        let sent = broadcaster.publish(&topic, deleted_event(SessionId::new()));
        assert_eq!(sent, 1);
        assert_eq!(broadcaster.subscriber_count(&topic), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_detaches() {
        let broadcaster = broadcaster();
        let topic = Topic::User(UserId::new());

        let sub = broadcaster.subscribe(&topic).await.expect("subscribe");
        broadcaster.unsubscribe(&topic, sub.id);
        assert_eq!(broadcaster.subscriber_count(&topic), 0);
        assert_eq!(broadcaster.publish(&topic, deleted_event(SessionId::new())), 0);
    }

    struct OneSession(Session);

    #[async_trait]
    impl SnapshotSource for OneSession {
        async fn session_snapshot(&self, session_id: &SessionId) -> Option<Session> {
            (self.0.id == *session_id).then(|| self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_session_subscribe_gets_snapshot_before_events() {
        let broadcaster = broadcaster();
        let session = Session::new(
            UserId::new(),
            StationId::new("ST-1"),
            ConnectorId::new(1),
            None,
        );
        let session_id = session.id;
        broadcaster.set_snapshot_source(Arc::new(OneSession(session)));

        let topic = Topic::Session(session_id);
        let mut sub = broadcaster.subscribe(&topic).await.expect("subscribe");
        broadcaster.publish(&topic, deleted_event(session_id));

        let first = sub.recv().await.expect("snapshot frame");
        assert!(matches!(first.event, EventPayload::Snapshot(_)));
        let second = sub.recv().await.expect("event frame");
        assert!(matches!(second.event, EventPayload::Event(_)));
    }

    #[tokio::test]
    async fn test_unknown_session_subscribe_gets_no_snapshot() {
        let broadcaster = broadcaster();
        let topic = Topic::Session(SessionId::new());
        let mut sub = broadcaster.subscribe(&topic).await.expect("subscribe");
        assert!(sub.try_recv().is_none());
    }
}
