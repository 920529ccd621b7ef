//! Error types for Rota Core

use rusqlite::ffi;
use thiserror::Error;

use crate::config::ConfigError;
use crate::models::Lease;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict { message: String, current_version: u32 },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Store error: {0}")]
    Store(#[source] rusqlite::Error),

    #[error(
        "another user is performing {}, retry in ~{} minutes",
        .lease.operation.label(),
        .lease.remaining_minutes()
    )]
    LockDenied { lease: Box<Lease> },

    #[error("Lock operation failed: {0}")]
    LockOperation(#[source] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stable error tags shown to callers and logged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    Conflict,
    PermissionDenied,
    StoreError,
    LockDenied,
    LockOperationFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::StoreError => "STORE_ERROR",
            ErrorCode::LockDenied => "LOCK_DENIED",
            ErrorCode::LockOperationFailed => "LOCK_OPERATION_FAILED",
        }
    }
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Validation(_) | Error::Config(_) => ErrorCode::ValidationError,
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::Conflict { .. } => ErrorCode::Conflict,
            Error::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Error::Store(_) | Error::Io(_) | Error::Serialization(_) => ErrorCode::StoreError,
            Error::LockDenied { .. } => ErrorCode::LockDenied,
            Error::LockOperation(_) => ErrorCode::LockOperationFailed,
        }
    }
}

// Plain `?` on a SQLite call inside the schedule store lands here
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        classify_store_error(err)
    }
}

/// Map a SQLite failure onto the store error taxonomy
pub fn classify_store_error(err: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(ref failure, ref message) = err {
        match failure.code {
            ffi::ErrorCode::PermissionDenied
            | ffi::ErrorCode::ReadOnly
            | ffi::ErrorCode::AuthorizationForStatementDenied => {
                return Error::PermissionDenied(
                    message.clone().unwrap_or_else(|| failure.to_string()),
                );
            }
            ffi::ErrorCode::ConstraintViolation
                if failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                return Error::Conflict {
                    message: message.clone().unwrap_or_else(|| failure.to_string()),
                    current_version: 0,
                };
            }
            _ => {}
        }
    }
    Error::Store(err)
}

pub type Result<T> = std::result::Result<T, Error>;
