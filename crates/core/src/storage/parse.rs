//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;

use crate::models::{OperationKind, ScheduleStatus, StaffSchedule};

fn conversion_error<E>(column: usize, err: E) -> SqlError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SqlError::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(column: usize, s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

/// Parse a stored schedule status
pub fn parse_status(column: usize, s: &str) -> Result<ScheduleStatus, SqlError> {
    ScheduleStatus::from_str(s).ok_or_else(|| {
        conversion_error(
            column,
            UnknownVariant {
                kind: "schedule status",
                value: s.to_string(),
            },
        )
    })
}

/// Parse a stored lease operation kind
pub fn parse_operation(column: usize, s: &str) -> Result<OperationKind, SqlError> {
    OperationKind::from_str(s).ok_or_else(|| {
        conversion_error(
            column,
            UnknownVariant {
                kind: "operation kind",
                value: s.to_string(),
            },
        )
    })
}

/// Parse the JSON-encoded staff schedule list
pub fn parse_staff_schedules(column: usize, s: &str) -> Result<Vec<StaffSchedule>, SqlError> {
    serde_json::from_str(s).map_err(|e| conversion_error(column, e))
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
