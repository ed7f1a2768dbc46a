//! Subscriber handles and their receive side.

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::frame::OutboundFrame;

/// The broadcaster's send side for one subscriber on one topic.
#[derive(Debug, Clone)]
pub(crate) struct SubscriberHandle {
    pub id: Uuid,
    tx: mpsc::Sender<OutboundFrame>,
}

/// Delivery outcome for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Sent,
    /// Queue full; the frame was dropped but the subscriber stays.
    Lagged,
    /// Receiver gone; the subscriber should be pruned.
    Dead,
}

impl SubscriberHandle {
    pub fn new(id: Uuid, tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self { id, tx }
    }

    /// Best-effort, non-blocking delivery.
    pub fn deliver(&self, frame: OutboundFrame) -> Delivery {
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Sent,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                debug!(
                    subscriber_id = %self.id,
                    topic = %frame.topic,
                    "Subscriber queue full, dropping frame"
                );
                Delivery::Lagged
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Dead,
        }
    }
}

/// A live subscription held by a client connection.
///
/// Dropping it detaches the subscriber; the broadcaster prunes the
/// handle on its next publish to the topic.
#[derive(Debug)]
pub struct Subscription {
    /// Identity used to unsubscribe explicitly.
    pub id: Uuid,
    pub(crate) rx: mpsc::Receiver<OutboundFrame>,
}

impl Subscription {
    /// Receive the next frame. `None` after `unsubscribe`.
    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        self.rx.recv().await
    }

    /// Non-blocking receive, used by tests and drain loops.
    pub fn try_recv(&mut self) -> Option<OutboundFrame> {
        self.rx.try_recv().ok()
    }
}
