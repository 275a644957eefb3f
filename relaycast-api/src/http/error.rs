// HTTP error handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use relaycast_livestream::StreamError;

pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// An upstream platform or the relay engine failed.
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<relaycast_core::Error> for AppError {
    fn from(err: relaycast_core::Error) -> Self {
        use relaycast_core::Error;

        match err {
            Error::InvalidInput(msg) => Self::bad_request(msg),
            Error::Authentication(msg) => Self::unauthorized(msg),
            Error::NotFound(msg) => Self::not_found(msg),
            Error::AlreadyExists(msg) => Self::conflict(msg),
            Error::Entropy(msg) => {
                tracing::error!("Entropy source failure: {}", msg);
                Self::internal("Failed to generate stream key")
            }
            Error::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                Self::internal("Data processing error")
            }
            Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                Self::internal("Internal server error")
            }
        }
    }
}

impl From<StreamError> for AppError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Core(e) => e.into(),
            StreamError::Fanout(e) => Self::bad_gateway(e.to_string()),
            StreamError::Engine(e) => {
                tracing::warn!("Relay engine error: {}", e);
                Self::bad_gateway(e.to_string())
            }
            StreamError::AlreadyExists(unit) => Self::conflict(format!("worker {unit} is already running")),
            other => {
                tracing::error!("Relay worker error: {}", other);
                Self::internal("Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycast_platforms::{FanoutError, PlatformError};

    #[test]
    fn test_core_error_status() {
        let cases = [
            (relaycast_core::Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (relaycast_core::Error::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (relaycast_core::Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (relaycast_core::Error::Entropy("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn test_total_fanout_failure_is_bad_gateway() {
        let err = StreamError::Fanout(FanoutError::AllFailed(vec![(
            "youtube".to_string(),
            PlatformError::Api("quota exceeded".to_string()),
        )]));
        let app = AppError::from(err);
        assert_eq!(app.status, StatusCode::BAD_GATEWAY);
        assert!(app.message.contains("quota exceeded"));
    }
}
