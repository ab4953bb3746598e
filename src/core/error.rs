//! Core error taxonomy and stable error codes.

use std::fmt;

use thiserror::Error;

/// Stable machine-checkable error codes carried in IPC error payloads.
///
/// Codes are part of the wire contract: clients match on them, so variants
/// are renamed only with a protocol version bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MissingField,
    InvalidFormat,
    SlotTaken,
    NotFound,
    Forbidden,
    IoFailure,
    Overloaded,
    ParseError,
    IoError,
    Disconnected,
    DaemonUnavailable,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MissingField => "missing_field",
            ErrorCode::InvalidFormat => "invalid_format",
            ErrorCode::SlotTaken => "slot_taken",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::IoFailure => "io_failure",
            ErrorCode::Overloaded => "overloaded",
            ErrorCode::ParseError => "parse_error",
            ErrorCode::IoError => "io_error",
            ErrorCode::Disconnected => "disconnected",
            ErrorCode::DaemonUnavailable => "daemon_unavailable",
            ErrorCode::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input that failed shape validation before reaching the core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidInput {
    #[error("invalid date {raw:?}: {reason}")]
    Date { raw: String, reason: String },

    #[error("invalid time {raw:?}: {reason}")]
    Time { raw: String, reason: String },

    #[error("invalid slot key {raw:?}: {reason}")]
    SlotKey { raw: String, reason: String },

    /// The raw token is not echoed back: device ids act as capabilities.
    #[error("invalid device id: {reason}")]
    DeviceId { reason: String },

    #[error("invalid display name: {reason}")]
    DisplayName { reason: String },

    #[error("invalid reason {raw:?}: {reason}")]
    Reason { raw: String, reason: String },
}

impl InvalidInput {
    /// Request field the rejected value arrived in.
    pub fn field(&self) -> &'static str {
        match self {
            InvalidInput::Date { .. } => "date",
            InvalidInput::Time { .. } => "time",
            InvalidInput::SlotKey { .. } => "slot_key",
            InvalidInput::DeviceId { .. } => "device_id",
            InvalidInput::DisplayName { .. } => "booked_by",
            InvalidInput::Reason { .. } => "reason",
        }
    }
}

/// Errors from the pure core: everything here is a permanent rejection of the
/// caller's input, never a transient fault.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    #[error(transparent)]
    Invalid(#[from] InvalidInput),
}

impl CoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::Invalid(_) => ErrorCode::InvalidFormat,
        }
    }
}
