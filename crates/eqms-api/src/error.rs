//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use eqms_control::ControlError;
use sea_orm::DbErr;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Validation(msg) => ApiError::BadRequest(msg),
            e @ ControlError::InvalidTransition { .. } => ApiError::BadRequest(e.to_string()),
            ControlError::Forbidden(msg) => ApiError::Forbidden(msg),
            ControlError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            ControlError::Conflict(msg) => ApiError::Conflict(msg),
            ControlError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        ControlError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match self {
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => msg,
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: Some(code.to_string()),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use eqms_db::TicketStatus;

    #[test]
    fn test_control_error_mapping() {
        let cases = [
            (
                ApiError::from(ControlError::Validation("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(ControlError::InvalidTransition {
                    from: TicketStatus::Closed,
                    to: TicketStatus::EscalatedTier1,
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(ControlError::Forbidden("x".into())),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::from(ControlError::NotFound("Ticket".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(ControlError::Conflict("dup".into())),
                StatusCode::CONFLICT,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let err = ApiError::Internal("connection refused at 10.0.0.4".to_string());
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
