//! Pending-request table.
//!
//! Outbound CALLs are registered here before they are written to the
//! transport; inbound CALLRESULT/CALLERROR frames complete the matching
//! entry by message ID regardless of arrival order.

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::message::{GatewayError, ProtocolErrorCode};

/// Outcome delivered to a waiting caller.
pub type PendingReply = Result<Value, GatewayError>;

/// Table of in-flight requests keyed by message ID.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: DashMap<String, oneshot::Sender<PendingReply>>,
}

impl PendingTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Registers a request and returns the receiver the caller awaits.
    pub fn register(&self, message_id: String) -> oneshot::Receiver<PendingReply> {
        let (tx, rx) = oneshot::channel();
        self.entries.insert(message_id, tx);
        rx
    }

    /// Removes an entry without completing it (timeout path).
    pub fn discard(&self, message_id: &str) {
        self.entries.remove(message_id);
    }

    /// Completes a request with a successful payload.
    ///
    /// Returns false when no matching request was pending (late or
    /// unsolicited response).
    pub fn complete(&self, message_id: &str, payload: Value) -> bool {
        match self.entries.remove(message_id) {
            Some((_, tx)) => tx.send(Ok(payload)).is_ok(),
            None => false,
        }
    }

    /// Completes a request with a station-reported error.
    pub fn complete_error(
        &self,
        message_id: &str,
        code: ProtocolErrorCode,
        description: String,
        details: Value,
    ) -> bool {
        match self.entries.remove(message_id) {
            Some((_, tx)) => tx
                .send(Err(GatewayError::Remote {
                    code,
                    description,
                    details,
                }))
                .is_ok(),
            None => false,
        }
    }

    /// Fails every pending request, used when the transport drops.
    pub fn fail_all(&self) {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, tx)) = self.entries.remove(&id) {
                let _ = tx.send(Err(GatewayError::Unreachable));
            }
        }
    }

    /// Number of in-flight requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no requests are in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
