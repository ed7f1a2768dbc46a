//! The per-session actor.
//!
//! Each live session is owned by exactly one tokio task that consumes a
//! FIFO command queue. All mutation goes through that queue, so two
//! commands can never interleave and every read observes a consistent
//! snapshot.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use voltstream_core::config::session::TariffConfig;
use voltstream_core::{AppError, AppResult};
use voltstream_entity::session::{ProgressUpdate, Session, SessionStatus};

/// Fault details attached to a failing transition.
#[derive(Debug, Clone)]
pub struct Fault {
    pub code: String,
    pub message: String,
}

impl Fault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Outcome of applying a progress update.
#[derive(Debug)]
pub enum ProgressOutcome {
    /// The update was applied; the snapshot reflects it.
    Applied {
        session: Session,
        status_changed: bool,
    },
    /// The update was stale (terminal session or energy regression) and
    /// was dropped without error.
    Stale,
}

/// Commands accepted by a session actor, processed strictly in order.
pub enum SessionCommand {
    /// Read the current state.
    Snapshot { reply: oneshot::Sender<Session> },
    /// Record the station-assigned transaction ID.
    SetProviderTransaction {
        transaction_id: i32,
        reply: oneshot::Sender<Session>,
    },
    /// Move to a non-terminal state, validated against the lifecycle
    /// table.
    Transition {
        next: SessionStatus,
        fault: Option<Fault>,
        reply: oneshot::Sender<AppResult<Session>>,
    },
    /// Apply a telemetry/state sample.
    ApplyProgress {
        update: ProgressUpdate,
        reply: oneshot::Sender<ProgressOutcome>,
    },
    /// Move to a terminal state and derive final metrics.
    Terminate {
        status: SessionStatus,
        fault: Option<Fault>,
        unconfirmed_by_station: bool,
        reply: oneshot::Sender<AppResult<Session>>,
    },
}

pub(crate) struct SessionActor {
    session: Session,
    tariff: TariffConfig,
    rx: mpsc::Receiver<SessionCommand>,
}

impl SessionActor {
    pub fn new(session: Session, tariff: TariffConfig, rx: mpsc::Receiver<SessionCommand>) -> Self {
        Self {
            session,
            tariff,
            rx,
        }
    }

    pub async fn run(mut self) {
        let session_id = self.session.id;
        while let Some(command) = self.rx.recv().await {
            self.handle(command);
        }
        debug!(session_id = %session_id, "Session actor retired");
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.session.clone());
            }
            SessionCommand::SetProviderTransaction {
                transaction_id,
                reply,
            } => {
                self.session.provider_transaction_id = Some(transaction_id);
                self.session.updated_at = chrono::Utc::now();
                let _ = reply.send(self.session.clone());
            }
            SessionCommand::Transition { next, fault, reply } => {
                let _ = reply.send(self.transition(next, fault));
            }
            SessionCommand::ApplyProgress { update, reply } => {
                let _ = reply.send(self.apply_progress(update));
            }
            SessionCommand::Terminate {
                status,
                fault,
                unconfirmed_by_station,
                reply,
            } => {
                let _ = reply.send(self.terminate(status, fault, unconfirmed_by_station));
            }
        }
    }

    fn transition(&mut self, next: SessionStatus, fault: Option<Fault>) -> AppResult<Session> {
        if self.session.is_terminal() {
            return Err(AppError::session_already_terminal(format!(
                "Session {} is {}",
                self.session.id, self.session.status
            )));
        }
        if !self.session.status.can_transition_to(next) {
            return Err(AppError::validation(format!(
                "Illegal transition {} -> {} for session {}",
                self.session.status, next, self.session.id
            )));
        }
        self.session.status = next;
        if let Some(fault) = fault {
            self.session.error_code = Some(fault.code);
            self.session.error_message = Some(fault.message);
        }
        self.session.updated_at = chrono::Utc::now();
        Ok(self.session.clone())
    }

    fn terminate(
        &mut self,
        status: SessionStatus,
        fault: Option<Fault>,
        unconfirmed_by_station: bool,
    ) -> AppResult<Session> {
        if self.session.is_terminal() {
            return Err(AppError::session_already_terminal(format!(
                "Session {} is {}",
                self.session.id, self.session.status
            )));
        }
        if !status.is_terminal() || !self.session.status.can_transition_to(status) {
            return Err(AppError::validation(format!(
                "Illegal terminal transition {} -> {} for session {}",
                self.session.status, status, self.session.id
            )));
        }
        self.session.status = status;
        if let Some(fault) = fault {
            self.session.error_code = Some(fault.code);
            self.session.error_message = Some(fault.message);
        }
        self.session.unconfirmed_by_station = unconfirmed_by_station;
        self.session
            .finalize_metrics(self.tariff.price_per_kwh, &self.tariff.currency);
        Ok(self.session.clone())
    }

    fn apply_progress(&mut self, update: ProgressUpdate) -> ProgressOutcome {
        if self.session.is_terminal() {
            debug!(
                session_id = %self.session.id,
                status = %self.session.status,
                "Dropping progress update for terminal session"
            );
            return ProgressOutcome::Stale;
        }

        if let Some(energy) = update.energy_delivered_kwh {
            if energy < self.session.energy_delivered_kwh {
                debug!(
                    session_id = %self.session.id,
                    reported = energy,
                    recorded = self.session.energy_delivered_kwh,
                    "Dropping stale energy sample"
                );
                return ProgressOutcome::Stale;
            }
            self.session.energy_delivered_kwh = energy;
        }

        if let Some(power) = update.current_power_kw {
            self.session.current_power_kw = power;
            if power > self.session.max_power_kw {
                self.session.max_power_kw = power;
            }
        }
        if let Some(code) = update.error_code {
            self.session.error_code = Some(code);
        }
        if let Some(message) = update.error_message {
            self.session.error_message = Some(message);
        }

        let mut status_changed = false;
        if let Some(next) = update.status {
            if next != self.session.status {
                if self.session.status.can_transition_to(next) {
                    self.session.status = next;
                    status_changed = true;
                    if next.is_terminal() {
                        self.session
                            .finalize_metrics(self.tariff.price_per_kwh, &self.tariff.currency);
                    }
                } else {
                    debug!(
                        session_id = %self.session.id,
                        current = %self.session.status,
                        requested = %next,
                        "Dropping illegal status change in progress update"
                    );
                }
            }
        }

        self.session.updated_at = chrono::Utc::now();
        ProgressOutcome::Applied {
            session: self.session.clone(),
            status_changed,
        }
    }
}
