//! The session registry: actor host and secondary indexes.

pub mod actor;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use voltstream_core::config::session::SessionConfig;
use voltstream_core::types::id::{ConnectorId, SessionId, StationId, UserId};
use voltstream_core::{AppError, AppResult};
use voltstream_entity::session::{ProgressUpdate, Session, SessionStatus};
use voltstream_realtime::SnapshotSource;

use self::actor::{Fault, ProgressOutcome, SessionActor, SessionCommand};

/// Queue depth per session actor.
const ACTOR_QUEUE_DEPTH: usize = 64;

/// Cloneable handle to one session's actor.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub station_id: StationId,
    pub connector_id: ConnectorId,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    async fn send<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> AppResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| AppError::session_not_found(format!("Session {} is gone", self.session_id)))?;
        rx.await
            .map_err(|_| AppError::internal(format!("Session {} actor dropped a reply", self.session_id)))
    }

    /// Current state of the session.
    pub async fn snapshot(&self) -> AppResult<Session> {
        self.send(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Record the station-assigned transaction ID.
    pub async fn set_provider_transaction(&self, transaction_id: i32) -> AppResult<Session> {
        self.send(|reply| SessionCommand::SetProviderTransaction {
            transaction_id,
            reply,
        })
        .await
    }

    /// Validated move to a non-terminal state.
    pub async fn transition(
        &self,
        next: SessionStatus,
        fault: Option<Fault>,
    ) -> AppResult<Session> {
        self.send(|reply| SessionCommand::Transition { next, fault, reply })
            .await?
    }

    /// Apply one telemetry/state sample.
    pub async fn apply_progress(&self, update: ProgressUpdate) -> AppResult<ProgressOutcome> {
        self.send(|reply| SessionCommand::ApplyProgress { update, reply })
            .await
    }

    /// Validated move to a terminal state with final metrics derivation.
    pub async fn terminate(
        &self,
        status: SessionStatus,
        fault: Option<Fault>,
        unconfirmed_by_station: bool,
    ) -> AppResult<Session> {
        self.send(|reply| SessionCommand::Terminate {
            status,
            fault,
            unconfirmed_by_station,
            reply,
        })
        .await?
    }
}

/// Host for all live session actors plus the lookup indexes backing the
/// one-session-per-user and one-session-per-connector invariants.
pub struct SessionRegistry {
    config: SessionConfig,
    sessions: DashMap<SessionId, SessionHandle>,
    by_user: DashMap<UserId, SessionId>,
    by_connector: DashMap<(StationId, ConnectorId), SessionId>,
    // Serializes availability-check + creation per connector.
    connector_locks: DashMap<(StationId, ConnectorId), Arc<Mutex<()>>>,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
            by_user: DashMap::new(),
            by_connector: DashMap::new(),
            connector_locks: DashMap::new(),
        }
    }

    /// Acquire the per-connector creation lock. Held by the service
    /// across the availability check and session insertion so two
    /// concurrent starts on one connector are decided in order.
    pub async fn connector_guard(
        &self,
        station_id: &StationId,
        connector_id: ConnectorId,
    ) -> OwnedMutexGuard<()> {
        let lock = self
            .connector_locks
            .entry((station_id.clone(), connector_id))
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Spawn an actor for a new session and index it.
    ///
    /// The user slot is claimed under the index entry's lock, so two
    /// concurrent inserts for one user (on different connectors, where
    /// the connector guard does not serialize them) admit exactly one.
    pub fn insert(&self, session: Session) -> AppResult<SessionHandle> {
        if self.config.single_session_per_user {
            match self.by_user.entry(session.user_id) {
                Entry::Occupied(mut entry) => {
                    let existing = *entry.get();
                    if self.sessions.contains_key(&existing) {
                        return Err(AppError::user_has_active_session(format!(
                            "User {} already holds session {existing}",
                            session.user_id
                        )));
                    }
                    // Stale mapping to an evicted actor; take it over.
                    entry.insert(session.id);
                }
                Entry::Vacant(entry) => {
                    entry.insert(session.id);
                }
            }
        } else {
            self.by_user.insert(session.user_id, session.id);
        }

        let (tx, rx) = mpsc::channel(ACTOR_QUEUE_DEPTH);
        let handle = SessionHandle {
            session_id: session.id,
            user_id: session.user_id,
            station_id: session.station_id.clone(),
            connector_id: session.connector_id,
            tx,
        };
        self.by_connector.insert(
            (session.station_id.clone(), session.connector_id),
            session.id,
        );
        info!(session_id = %session.id, station_id = %session.station_id, "Session actor started");
        tokio::spawn(SessionActor::new(session, self.config.tariff.clone(), rx).run());
        self.sessions.insert(handle.session_id, handle.clone());
        Ok(handle)
    }

    /// Handle for one session, when it is live.
    pub fn get(&self, session_id: &SessionId) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|entry| entry.clone())
    }

    /// The user's indexed session, when one is live.
    pub fn for_user(&self, user_id: &UserId) -> Option<SessionHandle> {
        let session_id = *self.by_user.get(user_id)?;
        self.get(&session_id)
    }

    /// The session occupying a connector, when one is live.
    pub fn for_connector(
        &self,
        station_id: &StationId,
        connector_id: ConnectorId,
    ) -> Option<SessionHandle> {
        let session_id = *self
            .by_connector
            .get(&(station_id.clone(), connector_id))?;
        self.get(&session_id)
    }

    /// All live handles.
    pub fn handles(&self) -> Vec<SessionHandle> {
        self.sessions.iter().map(|entry| entry.clone()).collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Release the secondary indexes after a session turned terminal so
    /// the user and connector are immediately free for a new session. The
    /// actor itself stays until eviction so late reads still resolve.
    pub fn release_indexes(&self, session: &Session) {
        self.by_user
            .remove_if(&session.user_id, |_, id| *id == session.id);
        self.by_connector.remove_if(
            &(session.station_id.clone(), session.connector_id),
            |_, id| *id == session.id,
        );
    }

    /// Drop a session's actor and every index entry pointing at it.
    pub fn remove(&self, session_id: &SessionId) -> Option<SessionHandle> {
        let (_, handle) = self.sessions.remove(session_id)?;
        self.by_user
            .remove_if(&handle.user_id, |_, id| id == session_id);
        self.by_connector.remove_if(
            &(handle.station_id.clone(), handle.connector_id),
            |_, id| id == session_id,
        );
        debug!(session_id = %session_id, "Session evicted from registry");
        Some(handle)
    }

    /// Evict terminal sessions past the grace period. Returns the evicted
    /// session IDs so the caller can publish deletions.
    pub async fn evict_terminal(&self) -> Vec<SessionId> {
        let grace = Duration::hours(self.config.eviction_grace_hours as i64);
        let now = Utc::now();
        let mut evicted = Vec::new();

        for handle in self.handles() {
            let Ok(session) = handle.snapshot().await else {
                // Actor already gone; drop the stale entry.
                self.remove(&handle.session_id);
                continue;
            };
            if !session.is_terminal() {
                continue;
            }
            let terminal_since = session.ended_at.unwrap_or(session.updated_at);
            if terminal_since + grace <= now {
                self.remove(&session.id);
                evicted.push(session.id);
            }
        }
        evicted
    }
}

#[async_trait]
impl SnapshotSource for SessionRegistry {
    async fn session_snapshot(&self, session_id: &SessionId) -> Option<Session> {
        self.get(session_id)?.snapshot().await.ok()
    }
}
