//! Error taxonomy for all API handlers.
//!
//! Validation and authorization failures abort before any mutation; datastore
//! failures surface as a generic server error with the cause logged.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid agent")]
    InvalidAgent,
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// "Title is required" style error for an empty required field.
    pub fn missing_field(field: &str) -> Self {
        let mut label = field.to_string();
        if let Some(first) = label.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        let message = format!("{} is required", label);
        Self::Validation {
            details: vec![FieldError {
                field: field.to_string(),
                message: message.clone(),
            }],
            message,
        }
    }

    pub fn invalid_field(field: &str, message: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
            details: vec![FieldError {
                field: field.to_string(),
                message: message.to_string(),
            }],
        }
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn forbidden(message: &str) -> Self {
        Self::Forbidden(message.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            ApiError::Validation { message, details } => {
                (StatusCode::BAD_REQUEST, message, Some(details))
            }
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message, None),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message, None),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string(), None),
            ApiError::InvalidAgent => (StatusCode::BAD_REQUEST, self.to_string(), None),
            ApiError::Database(_)
            | ApiError::Pool(_)
            | ApiError::Serialization(_)
            | ApiError::Internal(_) => {
                log::error!("Request failed: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string(), None)
            }
        };
        (status, Json(ErrorBody { message, details })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = ApiError::missing_field("title");
        assert_eq!(err.to_string(), "Title is required");
        match err {
            ApiError::Validation { details, .. } => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "title");
            }
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::not_found("Ticket").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::forbidden("nope").into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::InvalidAgent.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::missing_field("content").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(ApiError::not_found("Ticket").to_string(), "Ticket not found");
    }
}
