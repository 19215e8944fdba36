//! Error types for the scheduling engine.

use thiserror::Error;

/// Errors raised by the scheduling engine and its persistence boundary.
///
/// Queue operations on unknown ids are not errors; they report a no-op
/// through their return value instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Invalid time format: {0:?} (expected HH:MM)")]
    InvalidTimeFormat(String),

    #[error("Invalid date format: {0:?} (expected YYYY-MM-DD)")]
    InvalidDateFormat(String),

    #[error("Invalid duration: {0} minutes (must be positive)")]
    InvalidDuration(u32),

    #[error("Invalid operating window: {0}")]
    InvalidWindow(String),

    #[error("Entry cannot be persisted: {0}")]
    IncompleteEntry(String),

    #[error("Failed to fetch bookings: {0}")]
    Fetch(String),

    #[error("Failed to persist changes: {0}")]
    Persistence(String),
}

/// Result type alias for scheduling operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
