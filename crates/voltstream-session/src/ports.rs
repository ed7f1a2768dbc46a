//! Durable-store interfaces consumed by the session layer.
//!
//! The relational store behind these traits is out of scope; the traits
//! carry exactly what the lifecycle needs. Writes must be idempotent per
//! (id, updated_at).

use async_trait::async_trait;

use voltstream_core::types::id::{ConnectorId, SessionId, StationId, UserId};
use voltstream_core::AppResult;
use voltstream_entity::connector::Connector;
use voltstream_entity::session::Session;

/// Durable session records. A record is written at every state
/// transition, with the in-memory actor staying authoritative for live
/// sessions.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Insert or overwrite the session record.
    async fn save_session(&self, session: &Session) -> AppResult<()>;

    /// Fetch one session by ID.
    async fn get_session(&self, session_id: &SessionId) -> AppResult<Option<Session>>;

    /// All sessions for one user, newest first.
    async fn sessions_for_user(&self, user_id: &UserId) -> AppResult<Vec<Session>>;
}

/// Durable connector records, read by the availability oracle.
#[async_trait]
pub trait ConnectorStore: Send + Sync + 'static {
    /// Fetch one connector.
    async fn get_connector(
        &self,
        station_id: &StationId,
        connector_id: ConnectorId,
    ) -> AppResult<Option<Connector>>;

    /// Insert or overwrite the connector record.
    async fn save_connector(&self, connector: &Connector) -> AppResult<()>;

    /// All connectors of one station.
    async fn connectors_for_station(&self, station_id: &StationId) -> AppResult<Vec<Connector>>;
}
