//! Ownership/admin decisions for destructive booking actions.
//!
//! Creation is deliberately open: any actor may claim a free slot. Only the
//! destroy side is gated, and kiosk bookings raise the bar to admin.

use std::fmt;

use super::booking::BookingRecord;
use super::identity::DeviceId;

/// Destructive action being requested against an existing booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Cancel,
    Complete,
    Extract,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Cancel => "cancel",
            Action::Complete => "complete",
            Action::Extract => "extract",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub device_id: Option<DeviceId>,
    pub is_admin: bool,
}

impl Actor {
    pub fn device(device_id: DeviceId, is_admin: bool) -> Self {
        Self {
            device_id: Some(device_id),
            is_admin,
        }
    }

    pub fn admin() -> Self {
        Self {
            device_id: None,
            is_admin: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    KioskRequiresAdmin,
    NotOwningDevice,
}

impl DenyReason {
    pub fn message(self) -> &'static str {
        match self {
            DenyReason::KioskRequiresAdmin => "kiosk booking requires admin",
            DenyReason::NotOwningDevice => "not the owning device",
        }
    }
}

/// A denial, carrying the action it refused for error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Denial {
    pub action: Action,
    pub reason: DenyReason,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} denied: {}", self.action, self.reason.message())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

/// Pure authorization check, rules evaluated in order:
/// kiosk bookings demand admin, then non-admins must own the device.
pub fn authorize(action: Action, record: &BookingRecord, actor: &Actor) -> Decision {
    if record.kiosk && !actor.is_admin {
        return Decision::Deny(Denial {
            action,
            reason: DenyReason::KioskRequiresAdmin,
        });
    }
    if !actor.is_admin && actor.device_id.as_ref() != Some(&record.device_id) {
        return Decision::Deny(Denial {
            action,
            reason: DenyReason::NotOwningDevice,
        });
    }
    Decision::Allow
}
