//! OCPP JSON message framing.
//!
//! OCPP uses JSON arrays over the transport with a fixed shape:
//! - CALL: `[2, messageId, action, payload]`
//! - CALLRESULT: `[3, messageId, payload]`
//! - CALLERROR: `[4, messageId, errorCode, errorDescription, errorDetails]`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// OCPP message type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Call = 2,
    CallResult = 3,
    CallError = 4,
}

/// OCPP protocol-level error codes carried in CALLERROR frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolErrorCode {
    FormatViolation,
    GenericError,
    InternalError,
    NotImplemented,
    NotSupported,
    ProtocolError,
    SecurityError,
    TypeConstraintViolation,
}

/// OCPP action names exchanged with stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Authorize,
    StartTransaction,
    StopTransaction,
    StatusNotification,
    MeterValues,
    Heartbeat,
    BootNotification,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::str::FromStr for Action {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Authorize" => Ok(Action::Authorize),
            "StartTransaction" => Ok(Action::StartTransaction),
            "StopTransaction" => Ok(Action::StopTransaction),
            "StatusNotification" => Ok(Action::StatusNotification),
            "MeterValues" => Ok(Action::MeterValues),
            "Heartbeat" => Ok(Action::Heartbeat),
            "BootNotification" => Ok(Action::BootNotification),
            _ => Err(GatewayError::UnknownAction(s.to_string())),
        }
    }
}

/// Errors in protocol message handling.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid message format")]
    InvalidFormat,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(i64),

    #[error("Station returned {code:?}: {description}")]
    Remote {
        code: ProtocolErrorCode,
        description: String,
        details: Value,
    },

    #[error("Timeout waiting for response")]
    Timeout,

    #[error("Station transport is down")]
    Unreachable,

    #[error("Connection closed")]
    ConnectionClosed,
}

/// OCPP CALL message (request).
#[derive(Debug, Clone)]
pub struct Call {
    pub message_id: String,
    pub action: Action,
    pub payload: Value,
}

impl Call {
    /// Create a new CALL with an auto-generated message ID.
    pub fn new(action: Action, payload: impl Serialize) -> Result<Self, GatewayError> {
        Ok(Self {
            message_id: Uuid::new_v4().to_string(),
            action,
            payload: serde_json::to_value(payload)?,
        })
    }
}

/// OCPP CALLRESULT message (success response).
#[derive(Debug, Clone)]
pub struct CallResult {
    pub message_id: String,
    pub payload: Value,
}

impl CallResult {
    /// Create a response to a received CALL.
    pub fn new(message_id: impl Into<String>, payload: impl Serialize) -> Result<Self, GatewayError> {
        Ok(Self {
            message_id: message_id.into(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Deserialize the payload into a typed response.
    pub fn parse_payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, GatewayError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// OCPP CALLERROR message (failure response).
#[derive(Debug, Clone)]
pub struct CallError {
    pub message_id: String,
    pub error_code: ProtocolErrorCode,
    pub error_description: String,
    pub error_details: Value,
}

/// Any OCPP frame.
#[derive(Debug, Clone)]
pub enum OcppMessage {
    Call(Call),
    CallResult(CallResult),
    CallError(CallError),
}

impl OcppMessage {
    /// Serialize to the wire array format.
    pub fn to_frame(&self) -> Result<String, GatewayError> {
        let array = match self {
            Self::Call(call) => serde_json::json!([
                MessageType::Call as i64,
                &call.message_id,
                call.action.to_string(),
                &call.payload,
            ]),
            Self::CallResult(result) => serde_json::json!([
                MessageType::CallResult as i64,
                &result.message_id,
                &result.payload,
            ]),
            Self::CallError(error) => serde_json::json!([
                MessageType::CallError as i64,
                &error.message_id,
                error.error_code,
                &error.error_description,
                &error.error_details,
            ]),
        };
        Ok(serde_json::to_string(&array)?)
    }

    /// Parse a wire frame, matching by the leading message type ID.
    pub fn parse(frame: &str) -> Result<Self, GatewayError> {
        let value: Value = serde_json::from_str(frame)?;
        let array = value.as_array().ok_or(GatewayError::InvalidFormat)?;
        if array.len() < 3 {
            return Err(GatewayError::InvalidFormat);
        }

        let message_type = array[0].as_i64().ok_or(GatewayError::InvalidFormat)?;
        let message_id = array[1]
            .as_str()
            .ok_or(GatewayError::InvalidFormat)?
            .to_string();

        match message_type {
            2 => {
                if array.len() != 4 {
                    return Err(GatewayError::InvalidFormat);
                }
                let action: Action = array[2]
                    .as_str()
                    .ok_or(GatewayError::InvalidFormat)?
                    .parse()?;
                Ok(Self::Call(Call {
                    message_id,
                    action,
                    payload: array[3].clone(),
                }))
            }
            3 => Ok(Self::CallResult(CallResult {
                message_id,
                payload: array[2].clone(),
            })),
            4 => {
                if array.len() != 5 {
                    return Err(GatewayError::InvalidFormat);
                }
                let error_code: ProtocolErrorCode = serde_json::from_value(array[2].clone())?;
                Ok(Self::CallError(CallError {
                    message_id,
                    error_code,
                    error_description: array[3].as_str().unwrap_or_default().to_string(),
                    error_details: array[4].clone(),
                }))
            }
            other => Err(GatewayError::UnknownMessageType(other)),
        }
    }
}
