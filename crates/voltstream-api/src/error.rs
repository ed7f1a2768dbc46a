//! Maps domain `AppError` to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use voltstream_core::error::{AppError, ErrorKind};

/// Standard API error envelope: `{ "error": { "kind", "message" } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable error kind (`CONNECTOR_UNAVAILABLE`, ...).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

/// Wrapper so handlers can return `Result<_, ApiError>` with `?`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        Self(error)
    }
}

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::SessionNotFound => StatusCode::NOT_FOUND,
        ErrorKind::ConnectorUnavailable
        | ErrorKind::UserHasActiveSession
        | ErrorKind::SessionAlreadyTerminal => StatusCode::CONFLICT,
        ErrorKind::AuthorizationRejected => StatusCode::FORBIDDEN,
        ErrorKind::ProtocolTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::StationUnreachable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ProtocolError | ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
        ErrorKind::Storage
        | ErrorKind::Configuration
        | ErrorKind::Serialization
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "Internal server error");
        }
        let body = ApiErrorResponse {
            error: ApiErrorBody {
                kind: self.0.kind.to_string(),
                message: self.0.message,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(ErrorKind::ConnectorUnavailable),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(ErrorKind::SessionNotFound),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(ErrorKind::ProtocolTimeout),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(ErrorKind::StationUnreachable),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_envelope_shape() {
        let body = ApiErrorResponse {
            error: ApiErrorBody {
                kind: ErrorKind::UserHasActiveSession.to_string(),
                message: "busy".to_string(),
            },
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["error"]["kind"], "USER_HAS_ACTIVE_SESSION");
        assert_eq!(json["error"]["message"], "busy");
    }
}
