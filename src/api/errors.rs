//! API Error Handling
//!
//! Engine errors rendered as JSON with an HTTP status and the request id.

use crate::errors::{EngineError, GameError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Game error name (`BetNotActive`) or a transport class (`BAD_REQUEST`)
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    /// Rejected by game rules
    Game(GameError),
    BadRequest(String),
    /// Bearer key missing its registration
    Unauthenticated(String),
    InternalError(String),
}

impl ApiError {
    pub fn game(request_id: String, error: GameError) -> Self {
        Self {
            kind: ApiErrorKind::Game(error),
            request_id,
        }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    pub fn unauthenticated(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::Unauthenticated(message),
            request_id,
        }
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::InternalError(message),
            request_id,
        }
    }

    pub fn from_engine(request_id: String, error: EngineError) -> Self {
        match error {
            EngineError::Game(e) => Self::game(request_id, e),
            other => {
                tracing::error!(request_id = %request_id, error = %other, "engine failure");
                Self::internal_error(request_id, other.to_string())
            }
        }
    }
}

/// HTTP status for a business rejection.
pub fn status_for(error: GameError) -> StatusCode {
    match error {
        GameError::RoundNotFound | GameError::BetNotFound => StatusCode::NOT_FOUND,
        GameError::Unauthorized => StatusCode::FORBIDDEN,
        GameError::RoundAlreadyExists
        | GameError::InvalidRoundStatus
        | GameError::BetAlreadyPlaced
        | GameError::BetNotActive
        | GameError::AlreadyCrashed => StatusCode::CONFLICT,
        GameError::InvalidServerSeedHash
        | GameError::InvalidMultiplier
        | GameError::InvalidBetAmount => StatusCode::BAD_REQUEST,
        GameError::TransferFailed => StatusCode::BAD_GATEWAY,
        GameError::AdminNotInitialized => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::Game(e) => write!(f, "[{}] {}: {}", self.request_id, e.name(), e),
            ApiErrorKind::BadRequest(msg) => write!(f, "[{}] Bad Request: {}", self.request_id, msg),
            ApiErrorKind::Unauthenticated(msg) => write!(f, "[{}] Unauthenticated: {}", self.request_id, msg),
            ApiErrorKind::InternalError(msg) => write!(f, "[{}] Internal Error: {}", self.request_id, msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.kind {
            ApiErrorKind::Game(e) => (
                status_for(*e),
                ErrorBody {
                    code: e.name().to_string(),
                    message: e.to_string(),
                    details: Some(serde_json::json!({ "code": e.code() })),
                },
            ),
            ApiErrorKind::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "BAD_REQUEST".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
            ApiErrorKind::Unauthenticated(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "UNAUTHENTICATED".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
            ApiErrorKind::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    code: "INTERNAL_ERROR".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: body,
        });

        (status, body).into_response()
    }
}
