//! Operation errors and results for the reservation surface.
//!
//! Every failure here maps to a stable error code, a retryability hint, and
//! what we know about side effects, so callers can decide whether to retry
//! the whole operation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{AuditReason, Denial, ErrorCode, InvalidInput, SlotKey, SlotTime};
use crate::daemon::bus::BusError;
use crate::daemon::ledger::LedgerError;
use crate::daemon::names::RosterError;
use crate::daemon::store::StoreError;
use crate::error::{Effect, Transience};

// =============================================================================
// OpError
// =============================================================================

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum OpError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error(transparent)]
    Invalid(#[from] InvalidInput),

    #[error("time {time} is outside desk hours")]
    OutsideHours { time: SlotTime },

    #[error("{date} is not a business day")]
    NotABusinessDay { date: crate::core::SlotDate },

    #[error("slot already booked: {key}")]
    SlotTaken { key: SlotKey },

    #[error("no booking found for slot {key}")]
    NotFound { key: SlotKey },

    #[error("{denial}")]
    Forbidden { denial: Denial },

    #[error("admin verification is not configured")]
    AdminDisabled,

    #[error("invalid admin password")]
    AdminRejected,

    #[error("audit ledger append failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("snapshot persistence failed: {0}")]
    Store(StoreError),

    #[error("display name roster unavailable: {0}")]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

impl From<StoreError> for OpError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SlotTaken { key } => OpError::SlotTaken { key },
            other => OpError::Store(other),
        }
    }
}

impl OpError {
    /// Stable error code for IPC responses.
    pub fn code(&self) -> ErrorCode {
        match self {
            OpError::MissingField { .. } => ErrorCode::MissingField,
            OpError::Invalid(_) | OpError::OutsideHours { .. } | OpError::NotABusinessDay { .. } => {
                ErrorCode::InvalidFormat
            }
            OpError::SlotTaken { .. } => ErrorCode::SlotTaken,
            OpError::NotFound { .. } => ErrorCode::NotFound,
            OpError::Forbidden { .. } | OpError::AdminDisabled | OpError::AdminRejected => {
                ErrorCode::Forbidden
            }
            OpError::Ledger(_) | OpError::Store(_) | OpError::Roster(_) => ErrorCode::IoFailure,
            OpError::Bus(BusError::SubscriberLimitReached { .. }) => ErrorCode::Overloaded,
            OpError::Bus(BusError::LockPoisoned) => ErrorCode::Internal,
        }
    }

    /// Whether retrying this operation may succeed.
    pub fn transience(&self) -> Transience {
        match self {
            OpError::Ledger(_) | OpError::Store(_) | OpError::Roster(_) => Transience::Retryable,
            OpError::Bus(BusError::SubscriberLimitReached { .. }) => Transience::Retryable,
            OpError::Bus(BusError::LockPoisoned) => Transience::Unknown,
            _ => Transience::Permanent,
        }
    }

    /// What we know about side effects when this error is returned.
    ///
    /// A failed ledger append aborts before the store mutates, so the
    /// booking is intact. A failed snapshot write rolls the table back, but
    /// on the removal path a mandatory audit row has already landed; that is
    /// the documented inconsistency window, hence `Unknown`.
    pub fn effect(&self) -> Effect {
        match self {
            OpError::Store(_) => Effect::Unknown,
            _ => Effect::None,
        }
    }
}

// =============================================================================
// Operation results
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookOutput {
    pub key: SlotKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOutput {
    pub key: SlotKey,
    /// Always true on success: the audit row is appended before the store
    /// removal is allowed to proceed.
    pub audit_written: bool,
    pub ledger_file: String,
    pub reason: AuditReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractOutput {
    pub key: SlotKey,
    pub ledger_file: String,
    pub reason: AuditReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            OpError::MissingField { field: "date" }.code().as_str(),
            "missing_field"
        );
        assert_eq!(
            OpError::SlotTaken {
                key: SlotKey::parse("2025-11-03_09:00").unwrap()
            }
            .code()
            .as_str(),
            "slot_taken"
        );
        assert_eq!(OpError::AdminRejected.code().as_str(), "forbidden");
    }

    #[test]
    fn io_failures_are_retryable() {
        let err = OpError::Ledger(LedgerError::Io {
            path: "/x".into(),
            source: std::io::Error::other("disk"),
        });
        assert!(err.transience().is_retryable());
        assert_eq!(err.effect(), Effect::None);
        assert_eq!(err.code().as_str(), "io_failure");
    }
}
