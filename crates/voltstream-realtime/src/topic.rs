//! Topic names and their typed form.

use std::fmt;

use voltstream_core::types::id::{SessionId, StationId, UserId};
use voltstream_core::AppError;

/// A broadcast topic.
///
/// Wire form is `<kind>:<id>`, e.g. `session:7f6b...`, `station:ST-0042`,
/// `user:c0ff...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// All events for one session.
    Session(SessionId),
    /// Connector and session events for one station.
    Station(StationId),
    /// Session lifecycle events for one user.
    User(UserId),
}

impl Topic {
    /// Parse the wire form.
    pub fn parse(name: &str) -> Result<Self, AppError> {
        let (kind, id) = name
            .split_once(':')
            .ok_or_else(|| AppError::validation(format!("Malformed topic: {name}")))?;
        if id.is_empty() {
            return Err(AppError::validation(format!("Malformed topic: {name}")));
        }
        match kind {
            "session" => {
                let session_id = id
                    .parse()
                    .map_err(|_| AppError::validation(format!("Invalid session topic: {name}")))?;
                Ok(Self::Session(session_id))
            }
            "station" => Ok(Self::Station(StationId::new(id))),
            "user" => {
                let user_id = id
                    .parse()
                    .map_err(|_| AppError::validation(format!("Invalid user topic: {name}")))?;
                Ok(Self::User(user_id))
            }
            other => Err(AppError::validation(format!("Unknown topic kind: {other}"))),
        }
    }

    /// The wire form of this topic.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session:{id}"),
            Self::Station(id) => write!(f, "station:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}
