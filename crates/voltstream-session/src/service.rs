//! The session service.
//!
//! Drives the lifecycle end to end: validates preconditions, runs the
//! protocol exchanges through the gateway, commits every transition to
//! the registry actor and the durable store, and only then publishes to
//! the broadcaster. A failure during creation rolls back to no visible
//! session; a failure during stop still leaves the session terminal.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};

use voltstream_core::config::session::SessionConfig;
use voltstream_core::events::{AlertSeverity, ConnectorEvent, DomainEvent, SessionEvent};
use voltstream_core::traits::{Notifier, PaymentProvider};
use voltstream_core::types::id::{ConnectorId, SessionId, StationId, UserId, VehicleId};
use voltstream_core::{AppError, AppResult};
use voltstream_entity::connector::ConnectorStatus;
use voltstream_entity::session::{
    ProgressUpdate, Session, SessionStatus, SessionSummary, StopReason,
};
use voltstream_gateway::payloads::AuthorizationStatus;
use voltstream_gateway::ProtocolGateway;
use voltstream_realtime::{Broadcaster, Topic};

use crate::oracle::ConnectorOracle;
use crate::ports::SessionStore;
use crate::registry::actor::{Fault, ProgressOutcome};
use crate::registry::{SessionHandle, SessionRegistry};

/// Parameters of a start request.
#[derive(Debug, Clone, Deserialize)]
pub struct StartSessionRequest {
    pub user_id: UserId,
    pub station_id: StationId,
    pub connector_id: ConnectorId,
    #[serde(default)]
    pub vehicle_id: Option<VehicleId>,
    /// Charging token presented to the station for authorization.
    pub id_tag: String,
}

/// Parameters of a stop request.
#[derive(Debug, Clone, Deserialize)]
pub struct StopSessionRequest {
    #[serde(default = "default_stop_reason")]
    pub reason: StopReason,
    /// Terminate locally even when the station cannot confirm the stop.
    #[serde(default)]
    pub force_stop: bool,
}

fn default_stop_reason() -> StopReason {
    StopReason::UserRequest
}

impl Default for StopSessionRequest {
    fn default() -> Self {
        Self {
            reason: default_stop_reason(),
            force_stop: false,
        }
    }
}

pub struct SessionService {
    config: SessionConfig,
    registry: Arc<SessionRegistry>,
    oracle: Arc<ConnectorOracle>,
    gateway: Arc<ProtocolGateway>,
    store: Arc<dyn SessionStore>,
    broadcaster: Arc<Broadcaster>,
    payment: Arc<dyn PaymentProvider>,
    notifier: Arc<dyn Notifier>,
}

impl SessionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SessionConfig,
        registry: Arc<SessionRegistry>,
        oracle: Arc<ConnectorOracle>,
        gateway: Arc<ProtocolGateway>,
        store: Arc<dyn SessionStore>,
        broadcaster: Arc<Broadcaster>,
        payment: Arc<dyn PaymentProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            registry,
            oracle,
            gateway,
            store,
            broadcaster,
            payment,
            notifier,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn oracle(&self) -> &Arc<ConnectorOracle> {
        &self.oracle
    }

    // -- Lifecycle operations ------------------------------------------------

    /// Start a charging session.
    ///
    /// The availability check and the session insertion run under the
    /// per-connector guard, so concurrent starts on one connector are
    /// decided strictly in order. The one-session-per-user claim is
    /// decided atomically inside the registry insert, which covers
    /// concurrent starts by one user on different connectors. The
    /// protocol exchange happens after the guard is released; its
    /// failure terminates the session as FAILED.
    pub async fn start_session(&self, request: StartSessionRequest) -> AppResult<Session> {
        if self.config.single_session_per_user {
            if let Some(existing) = self.registry.for_user(&request.user_id) {
                return Err(AppError::user_has_active_session(format!(
                    "User {} already holds session {}",
                    request.user_id, existing.session_id
                )));
            }
        }

        let handle = {
            let _guard = self
                .registry
                .connector_guard(&request.station_id, request.connector_id)
                .await;

            if self
                .registry
                .for_connector(&request.station_id, request.connector_id)
                .is_some()
            {
                return Err(AppError::connector_unavailable(format!(
                    "Connector {} on station {} already hosts a session",
                    request.connector_id, request.station_id
                )));
            }
            self.oracle
                .check_available(&request.station_id, request.connector_id)
                .await?;

            let session = Session::new(
                request.user_id,
                request.station_id.clone(),
                request.connector_id,
                request.vehicle_id,
            );
            // The insert claims the user and connector slots; a store
            // failure afterwards rolls the claim back so nothing stays
            // behind.
            let handle = self.registry.insert(session.clone())?;
            if let Err(error) = self.store.save_session(&session).await {
                self.registry.remove(&session.id);
                return Err(error);
            }
            self.publish_session(
                &session,
                SessionEvent::SessionCreated {
                    session_id: session.id,
                    user_id: session.user_id,
                    station_id: session.station_id.clone(),
                    connector_id: session.connector_id,
                    started_at: session.started_at,
                },
            );
            handle
        };

        match self.run_start_exchange(&handle, &request.id_tag).await {
            Ok(session) => {
                info!(session_id = %session.id, station_id = %session.station_id, "Session charging");
                self.notifier
                    .notify(
                        session.user_id,
                        "session_started",
                        serde_json::json!({
                            "session_id": session.id,
                            "station_id": session.station_id,
                            "connector_id": session.connector_id,
                        }),
                    )
                    .await;
                Ok(session)
            }
            Err(error) => {
                warn!(
                    session_id = %handle.session_id,
                    error = %error,
                    "Start exchange failed, terminating session"
                );
                self.fail_session(&handle, &error).await;
                Err(error)
            }
        }
    }

    async fn run_start_exchange(
        &self,
        handle: &SessionHandle,
        id_tag: &str,
    ) -> AppResult<Session> {
        let info = self.gateway.authorize(&handle.station_id, id_tag).await?;
        if info.status != AuthorizationStatus::Accepted {
            return Err(AppError::authorization_rejected(format!(
                "Station rejected token: {:?}",
                info.status
            )));
        }

        let session = handle.transition(SessionStatus::Starting, None).await?;
        self.store.save_session(&session).await?;
        self.publish_status(&session);

        let response = self
            .gateway
            .start_transaction(&handle.station_id, handle.connector_id, id_tag, 0)
            .await?;
        handle
            .set_provider_transaction(response.transaction_id)
            .await?;

        let session = handle.transition(SessionStatus::Charging, None).await?;
        self.store.save_session(&session).await?;
        self.set_connector_status(&session, ConnectorStatus::Occupied)
            .await;
        self.publish_status(&session);
        Ok(session)
    }

    /// Stop a session and return its final summary.
    ///
    /// Stopping an already-terminal session returns the existing summary
    /// without mutating metrics. A stop never leaves the session
    /// non-terminal: when the station cannot confirm the stop the
    /// session is terminated locally anyway, as COMPLETED with
    /// `unconfirmed_by_station` under `force_stop`, or as FAILED with
    /// the transport error surfaced to the caller otherwise.
    pub async fn stop_session(
        &self,
        session_id: &SessionId,
        request: StopSessionRequest,
    ) -> AppResult<SessionSummary> {
        let Some(handle) = self.registry.get(session_id) else {
            let stored = self
                .store
                .get_session(session_id)
                .await?
                .ok_or_else(|| AppError::session_not_found(format!("No session {session_id}")))?;
            if stored.is_terminal() {
                return Ok(SessionSummary::from(&stored));
            }
            // A non-terminal session always has a live actor.
            return Err(AppError::internal(format!(
                "Session {session_id} has no live actor"
            )));
        };

        let session = handle.snapshot().await?;
        if session.is_terminal() {
            return Ok(SessionSummary::from(&session));
        }

        let mut target = if request.reason.is_failure() {
            SessionStatus::Failed
        } else if request.reason == StopReason::EmergencyStop
            || matches!(
                session.status,
                SessionStatus::Initiating | SessionStatus::Starting
            )
            || (request.reason == StopReason::UserRequest && !session.has_delivered_energy())
        {
            SessionStatus::Cancelled
        } else {
            SessionStatus::Completed
        };

        let mut unconfirmed = false;
        let mut stop_failure = None;
        if let Some(transaction_id) = session.provider_transaction_id {
            let meter_stop = (session.energy_delivered_kwh * 1000.0).round() as i32;
            let result = self
                .gateway
                .stop_transaction(
                    &session.station_id,
                    transaction_id,
                    meter_stop,
                    Some(request.reason.as_protocol_str()),
                )
                .await;
            match result {
                Ok(_) => {}
                Err(error) if request.force_stop => {
                    warn!(
                        session_id = %session.id,
                        error = %error,
                        "Station did not confirm stop, terminating locally"
                    );
                    unconfirmed = true;
                }
                Err(error) => {
                    warn!(
                        session_id = %session.id,
                        error = %error,
                        "Station did not confirm stop, failing session"
                    );
                    target = SessionStatus::Failed;
                    unconfirmed = true;
                    stop_failure = Some(error);
                }
            }
        }

        let fault = match &stop_failure {
            Some(error) => Some(Fault::new(error.kind.to_string(), error.message.clone())),
            None => (target == SessionStatus::Failed).then(|| {
                Fault::new(
                    request.reason.as_protocol_str(),
                    format!("Stopped with reason {:?}", request.reason),
                )
            }),
        };
        let session = match handle.terminate(target, fault, unconfirmed).await {
            Ok(session) => session,
            // Lost the race against a concurrent stop; idempotent result.
            Err(error)
                if error.kind == voltstream_core::error::ErrorKind::SessionAlreadyTerminal =>
            {
                let session = handle.snapshot().await?;
                return Ok(SessionSummary::from(&session));
            }
            Err(error) => return Err(error),
        };

        self.store.save_session(&session).await?;
        self.registry.release_indexes(&session);
        self.set_connector_status(&session, ConnectorStatus::Available)
            .await;
        self.publish_status(&session);
        if session.status == SessionStatus::Completed {
            self.publish_session(
                &session,
                SessionEvent::SessionCompleted {
                    session_id: session.id,
                    energy_delivered_kwh: session.energy_delivered_kwh,
                    duration_seconds: session.duration_seconds.unwrap_or(0),
                    cost_amount: session.cost_amount.unwrap_or(0.0),
                    cost_currency: session
                        .cost_currency
                        .clone()
                        .unwrap_or_else(|| self.config.tariff.currency.clone()),
                },
            );
            self.capture_payment(&session).await;
        }
        self.notifier
            .notify(
                session.user_id,
                "session_stopped",
                serde_json::json!({
                    "session_id": session.id,
                    "status": session.status,
                    "energy_delivered_kwh": session.energy_delivered_kwh,
                    "cost_amount": session.cost_amount,
                }),
            )
            .await;
        info!(session_id = %session.id, status = %session.status, "Session stopped");
        // The session is terminal either way; the unconfirmed protocol
        // failure still surfaces to the caller.
        if let Some(error) = stop_failure {
            return Err(error);
        }
        Ok(SessionSummary::from(&session))
    }

    /// Suspend delivery. CHARGING -> CHARGING_PAUSED.
    pub async fn pause_session(&self, session_id: &SessionId) -> AppResult<Session> {
        let handle = self.live_handle(session_id).await?;
        let session = handle
            .transition(SessionStatus::ChargingPaused, None)
            .await?;
        self.store.save_session(&session).await?;
        self.publish_status(&session);
        Ok(session)
    }

    /// Resume delivery. CHARGING_PAUSED -> CHARGING.
    pub async fn resume_session(&self, session_id: &SessionId) -> AppResult<Session> {
        let handle = self.live_handle(session_id).await?;
        let session = handle.transition(SessionStatus::Charging, None).await?;
        self.store.save_session(&session).await?;
        self.publish_status(&session);
        Ok(session)
    }

    /// Apply one telemetry/state sample to a live session.
    ///
    /// Returns `Ok(None)` when the update was stale or the session is not
    /// live; stale updates are never surfaced as errors.
    pub async fn apply_progress_update(
        &self,
        session_id: &SessionId,
        update: ProgressUpdate,
    ) -> AppResult<Option<Session>> {
        let Some(handle) = self.registry.get(session_id) else {
            debug!(session_id = %session_id, "Dropping progress update for unknown session");
            return Ok(None);
        };

        let alert_code = update.error_code.clone();
        let alert_message = update.error_message.clone();
        let temperature = update.temperature_celsius;

        match handle.apply_progress(update).await? {
            ProgressOutcome::Stale => Ok(None),
            ProgressOutcome::Applied {
                session,
                status_changed,
            } => {
                self.store.save_session(&session).await?;
                self.publish_session(
                    &session,
                    SessionEvent::ChargingProgress {
                        session_id: session.id,
                        energy_delivered_kwh: session.energy_delivered_kwh,
                        current_power_kw: session.current_power_kw,
                        temperature_celsius: temperature,
                    },
                );
                if status_changed {
                    self.publish_status(&session);
                    if session.is_terminal() {
                        self.registry.release_indexes(&session);
                    }
                }
                if let Some(code) = alert_code {
                    if !session.is_terminal() {
                        self.publish_session(
                            &session,
                            SessionEvent::ChargingAlert {
                                session_id: session.id,
                                severity: AlertSeverity::Warning,
                                code,
                                message: alert_message
                                    .unwrap_or_else(|| "Station reported an error".to_string()),
                            },
                        );
                    }
                }
                Ok(Some(session))
            }
        }
    }

    // -- Queries -------------------------------------------------------------

    /// The user's live session, when one exists.
    pub async fn active_session_for_user(&self, user_id: &UserId) -> AppResult<Option<Session>> {
        match self.registry.for_user(user_id) {
            Some(handle) => Ok(Some(handle.snapshot().await?)),
            None => Ok(None),
        }
    }

    /// One session by ID, live or stored.
    pub async fn get_session(&self, session_id: &SessionId) -> AppResult<Session> {
        if let Some(handle) = self.registry.get(session_id) {
            return handle.snapshot().await;
        }
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::session_not_found(format!("No session {session_id}")))
    }

    /// Session history for one user, from the store.
    pub async fn sessions_for_user(&self, user_id: &UserId) -> AppResult<Vec<Session>> {
        self.store.sessions_for_user(user_id).await
    }

    // -- Maintenance ---------------------------------------------------------

    /// One sweep pass: expire sessions on silent stations, then evict
    /// terminal sessions past the grace period.
    pub async fn sweep(&self) {
        let deadline = chrono::Duration::seconds(self.config.expiry_deadline_seconds as i64);
        let now = Utc::now();

        for handle in self.registry.handles() {
            let Ok(session) = handle.snapshot().await else {
                continue;
            };
            if session.is_terminal() {
                continue;
            }
            let silent = match self.gateway.last_seen(&session.station_id) {
                Some(last_seen) => now - last_seen >= deadline,
                None => true,
            };
            if !silent {
                continue;
            }
            info!(
                session_id = %session.id,
                station_id = %session.station_id,
                "Expiring session on silent station"
            );
            let fault = Fault::new(
                "station_silent",
                format!(
                    "No frames from station {} for over {} seconds",
                    session.station_id, self.config.expiry_deadline_seconds
                ),
            );
            match handle
                .terminate(SessionStatus::Expired, Some(fault), true)
                .await
            {
                Ok(expired) => {
                    if let Err(error) = self.store.save_session(&expired).await {
                        warn!(session_id = %expired.id, error = %error, "Failed to persist expiry");
                    }
                    self.registry.release_indexes(&expired);
                    self.publish_status(&expired);
                }
                Err(error) => {
                    debug!(session_id = %session.id, error = %error, "Expiry lost a race");
                }
            }
        }

        for session_id in self.registry.evict_terminal().await {
            self.broadcaster.publish(
                &Topic::Session(session_id),
                DomainEvent::Session(SessionEvent::SessionDeleted { session_id }),
            );
        }
    }

    // -- Internals -----------------------------------------------------------

    async fn live_handle(&self, session_id: &SessionId) -> AppResult<SessionHandle> {
        if let Some(handle) = self.registry.get(session_id) {
            let session = handle.snapshot().await?;
            if session.is_terminal() {
                return Err(AppError::session_already_terminal(format!(
                    "Session {session_id} is {}",
                    session.status
                )));
            }
            return Ok(handle);
        }
        match self.store.get_session(session_id).await? {
            Some(stored) if stored.is_terminal() => Err(AppError::session_already_terminal(
                format!("Session {session_id} is {}", stored.status),
            )),
            Some(_) => Err(AppError::internal(format!(
                "Session {session_id} has no live actor"
            ))),
            None => Err(AppError::session_not_found(format!("No session {session_id}"))),
        }
    }

    /// Terminate as FAILED after a start-exchange failure. Best-effort:
    /// the caller's original error is what surfaces.
    async fn fail_session(&self, handle: &SessionHandle, cause: &AppError) {
        let fault = Fault::new(cause.kind.to_string(), cause.message.clone());
        match handle.terminate(SessionStatus::Failed, Some(fault), false).await {
            Ok(session) => {
                if let Err(error) = self.store.save_session(&session).await {
                    warn!(session_id = %session.id, error = %error, "Failed to persist FAILED state");
                }
                self.registry.release_indexes(&session);
                self.publish_status(&session);
            }
            Err(error) => {
                warn!(session_id = %handle.session_id, error = %error, "Could not fail session");
            }
        }
    }

    async fn capture_payment(&self, session: &Session) {
        let (Some(amount), Some(currency)) = (session.cost_amount, session.cost_currency.clone())
        else {
            return;
        };
        if amount <= 0.0 {
            return;
        }
        let context = serde_json::json!({
            "session_id": session.id,
            "station_id": session.station_id,
        });
        match self
            .payment
            .charge_amount(session.user_id, amount, &currency, context)
            .await
        {
            Ok(reference) => {
                debug!(session_id = %session.id, reference = %reference, "Payment captured");
            }
            Err(error) => {
                warn!(session_id = %session.id, error = %error, "Payment capture failed");
            }
        }
    }

    async fn set_connector_status(&self, session: &Session, status: ConnectorStatus) {
        match self
            .oracle
            .set_status(&session.station_id, session.connector_id, status)
            .await
        {
            Ok(connector) => {
                // Best-effort push back to the station; an unreachable
                // station just misses the frame.
                if let Err(error) = self
                    .gateway
                    .status_notification(
                        &session.station_id,
                        session.connector_id,
                        connector.status.as_str(),
                        None,
                    )
                    .await
                {
                    debug!(
                        session_id = %session.id,
                        error = %error,
                        "Status push to station skipped"
                    );
                }
                self.broadcaster.publish(
                    &Topic::Station(session.station_id.clone()),
                    DomainEvent::Connector(ConnectorEvent::ConnectorStatusUpdate {
                        station_id: connector.station_id.clone(),
                        connector_id: connector.connector_id,
                        status: connector.status.as_str().to_string(),
                        error_code: None,
                    }),
                );
            }
            Err(error) => {
                warn!(
                    session_id = %session.id,
                    error = %error,
                    "Connector status update failed"
                );
            }
        }
    }

    fn topics(session: &Session) -> [Topic; 3] {
        [
            Topic::Session(session.id),
            Topic::Station(session.station_id.clone()),
            Topic::User(session.user_id),
        ]
    }

    fn publish_session(&self, session: &Session, event: SessionEvent) {
        self.broadcaster
            .publish_all(&Self::topics(session), DomainEvent::Session(event));
    }

    fn publish_status(&self, session: &Session) {
        self.publish_session(
            session,
            SessionEvent::SessionStatusUpdate {
                session_id: session.id,
                status: session.status.as_str().to_string(),
                error_code: session.error_code.clone(),
                error_message: session.error_message.clone(),
            },
        );
    }
}

/// Spawn the periodic sweep task (expiry + eviction).
pub fn spawn_sweeper(
    service: Arc<SessionService>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let interval = std::time::Duration::from_secs(service.config.sweep_interval_seconds);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => service.sweep().await,
                _ = shutdown.changed() => break,
            }
        }
        debug!("Registry sweeper stopped");
    })
}
