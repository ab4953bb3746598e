//! The booking record occupying a slot, and the audit vocabulary for its
//! lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::InvalidInput;
use super::identity::{DeviceId, DisplayName};
use super::time::WallClock;

/// A reservation occupying exactly one slot identity.
///
/// Immutable once created; "changing" a booking is cancel-then-rebook. The
/// record is destroyed only through the remove-with-audit path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub booked_by: DisplayName,
    pub device_id: DeviceId,
    pub booked_at: WallClock,
    #[serde(default)]
    pub kiosk: bool,
}

/// Why a row landed in the audit ledger.
///
/// `Booked` marks the best-effort creation row; the other three mark a
/// booking leaving the live store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditReason {
    Booked,
    Cancelled,
    Completed,
    Extracted,
}

impl AuditReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditReason::Booked => "booked",
            AuditReason::Cancelled => "cancelled",
            AuditReason::Completed => "completed",
            AuditReason::Extracted => "extracted",
        }
    }

    pub fn parse(s: &str) -> Result<Self, InvalidInput> {
        match s {
            "booked" => Ok(AuditReason::Booked),
            "cancelled" => Ok(AuditReason::Cancelled),
            "completed" => Ok(AuditReason::Completed),
            "extracted" => Ok(AuditReason::Extracted),
            _ => Err(InvalidInput::Reason {
                raw: s.to_string(),
                reason: "expected one of booked, cancelled, completed, extracted".to_string(),
            }),
        }
    }
}

impl fmt::Display for AuditReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
