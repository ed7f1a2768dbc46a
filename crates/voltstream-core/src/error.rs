//! Unified application error types for Voltstream.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested connector is occupied, reserved, out of service, or unknown.
    ConnectorUnavailable,
    /// The requesting user already holds a non-terminal charging session.
    UserHasActiveSession,
    /// The requested session was not found.
    SessionNotFound,
    /// The session has already reached a terminal state.
    SessionAlreadyTerminal,
    /// The station rejected the authorization token.
    AuthorizationRejected,
    /// A protocol request received no matching response within the timeout.
    ProtocolTimeout,
    /// The station's transport is down; the request was not attempted.
    StationUnreachable,
    /// The station returned a protocol-level error response.
    ProtocolError,
    /// Input validation failed.
    Validation,
    /// A durable store operation failed.
    Storage,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An external collaborator (payment, notification) failed.
    ExternalService,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectorUnavailable => write!(f, "CONNECTOR_UNAVAILABLE"),
            Self::UserHasActiveSession => write!(f, "USER_HAS_ACTIVE_SESSION"),
            Self::SessionNotFound => write!(f, "SESSION_NOT_FOUND"),
            Self::SessionAlreadyTerminal => write!(f, "SESSION_ALREADY_TERMINAL"),
            Self::AuthorizationRejected => write!(f, "AUTHORIZATION_REJECTED"),
            Self::ProtocolTimeout => write!(f, "PROTOCOL_TIMEOUT"),
            Self::StationUnreachable => write!(f, "STATION_UNREACHABLE"),
            Self::ProtocolError => write!(f, "PROTOCOL_ERROR"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Storage => write!(f, "STORAGE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::ExternalService => write!(f, "EXTERNAL_SERVICE"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

impl ErrorKind {
    /// Whether this kind is a synchronous validation rejection (never
    /// retried, surfaced verbatim to the caller).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ConnectorUnavailable
                | Self::UserHasActiveSession
                | Self::SessionNotFound
                | Self::SessionAlreadyTerminal
                | Self::Validation
        )
    }

    /// Whether this kind originates from the station protocol exchange.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::ProtocolTimeout
                | Self::StationUnreachable
                | Self::AuthorizationRejected
                | Self::ProtocolError
        )
    }
}

/// The unified application error used throughout Voltstream.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls. Callers receive a machine-readable kind
/// and a human-readable message; internal protocol message contents are
/// never embedded in the message.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a connector-unavailable error.
    pub fn connector_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectorUnavailable, message)
    }

    /// Create a user-has-active-session error.
    pub fn user_has_active_session(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserHasActiveSession, message)
    }

    /// Create a session-not-found error.
    pub fn session_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionNotFound, message)
    }

    /// Create a session-already-terminal error.
    pub fn session_already_terminal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionAlreadyTerminal, message)
    }

    /// Create an authorization-rejected error.
    pub fn authorization_rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthorizationRejected, message)
    }

    /// Create a protocol-timeout error.
    pub fn protocol_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolTimeout, message)
    }

    /// Create a station-unreachable error.
    pub fn station_unreachable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StationUnreachable, message)
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolError, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an external-service error.
    pub fn external_service(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalService, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
