//! DashMap-backed stores.
//!
//! Writes are idempotent whole-record upserts; reads return clones so
//! callers never hold references into the maps.

use async_trait::async_trait;
use dashmap::DashMap;

use voltstream_core::types::id::{ConnectorId, SessionId, StationId, UserId};
use voltstream_core::AppResult;
use voltstream_entity::connector::Connector;
use voltstream_entity::session::Session;
use voltstream_session::ports::{ConnectorStore, SessionStore};

/// In-memory session records.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save_session(&self, session: &Session) -> AppResult<()> {
        self.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: &SessionId) -> AppResult<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn sessions_for_user(&self, user_id: &UserId) -> AppResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|s| &s.user_id == user_id)
            .map(|s| s.clone())
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }
}

/// In-memory connector records.
#[derive(Default)]
pub struct InMemoryConnectorStore {
    connectors: DashMap<(StationId, ConnectorId), Connector>,
}

impl InMemoryConnectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, used by the binary's wiring and by tests.
    pub fn with_connectors(connectors: Vec<Connector>) -> Self {
        let store = Self::new();
        for connector in connectors {
            store.connectors.insert(
                (connector.station_id.clone(), connector.connector_id),
                connector,
            );
        }
        store
    }
}

#[async_trait]
impl ConnectorStore for InMemoryConnectorStore {
    async fn get_connector(
        &self,
        station_id: &StationId,
        connector_id: ConnectorId,
    ) -> AppResult<Option<Connector>> {
        Ok(self
            .connectors
            .get(&(station_id.clone(), connector_id))
            .map(|c| c.clone()))
    }

    async fn save_connector(&self, connector: &Connector) -> AppResult<()> {
        self.connectors.insert(
            (connector.station_id.clone(), connector.connector_id),
            connector.clone(),
        );
        Ok(())
    }

    async fn connectors_for_station(&self, station_id: &StationId) -> AppResult<Vec<Connector>> {
        let mut connectors: Vec<Connector> = self
            .connectors
            .iter()
            .filter(|c| &c.station_id == station_id)
            .map(|c| c.clone())
            .collect();
        connectors.sort_by_key(|c| c.connector_id);
        Ok(connectors)
    }
}
