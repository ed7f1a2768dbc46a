//! Application state shared across all handlers.

use std::sync::Arc;

use voltstream_core::config::AppConfig;
use voltstream_gateway::ProtocolGateway;
use voltstream_realtime::Broadcaster;
use voltstream_session::SessionService;

/// Shared dependencies, passed to every handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// The session service.
    pub sessions: Arc<SessionService>,
    /// The real-time broadcaster.
    pub broadcaster: Arc<Broadcaster>,
    /// The station gateway, for connectivity reporting.
    pub gateway: Arc<ProtocolGateway>,
}
