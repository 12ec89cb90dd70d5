//! Errors raised by the control plane

use eqms_db::TicketStatus;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: TicketStatus, to: TicketStatus },

    #[error("Database error: {0}")]
    Database(DbErr),
}

impl From<DbErr> for ControlError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => ControlError::Conflict(detail),
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                ControlError::Conflict(detail)
            }
            _ => ControlError::Database(err),
        }
    }
}

pub type ControlResult<T> = Result<T, ControlError>;
