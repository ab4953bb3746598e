//! Canonical API schemas for daemon IPC and CLI `--json`.
//!
//! These types are the truthful boundary: no lossy "view" structs that
//! silently drop information. Slot identities and timestamps serialize as
//! their canonical text forms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{AuditReason, BookingRecord, ClockTick, SlotDate, SlotKey, SlotTime};

// =============================================================================
// Daemon info
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonInfo {
    pub version: String,
    pub protocol_version: u32,
    pub pid: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub version: String,
    pub pid: u32,
    pub bookings: usize,
    pub subscribers: usize,
}

// =============================================================================
// Bookings
// =============================================================================

/// Public view of a booking record.
///
/// Currently identical in content to [`BookingRecord`]; kept as a separate
/// type so the wire shape can evolve without touching the store's snapshot
/// format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingView {
    pub booked_by: String,
    pub device_id: String,
    pub booked_at: String,
    pub kiosk: bool,
}

impl From<&BookingRecord> for BookingView {
    fn from(record: &BookingRecord) -> Self {
        Self {
            booked_by: record.booked_by.as_str().to_string(),
            device_id: record.device_id.as_str().to_string(),
            booked_at: record.booked_at.to_rfc3339(),
            kiosk: record.kiosk,
        }
    }
}

/// All live bookings for one day, keyed by slot time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayBookings {
    pub date: SlotDate,
    pub bookings: BTreeMap<SlotTime, BookingView>,
}

// =============================================================================
// Calendar
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayInfo {
    pub date: SlotDate,
    pub weekday: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaysOutput {
    pub days: Vec<DayInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotsOutput {
    pub slots: Vec<SlotTime>,
}

// =============================================================================
// Display names
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamesOutput {
    pub names: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadOutput {
    pub count: usize,
}

// =============================================================================
// Realtime subscriptions
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeInfo {
    pub date: SlotDate,
}

/// A booking-state change on one slot.
///
/// `record` carries the booking the event is about: the new record for
/// `booked`, the departed record for the removal reasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotEvent {
    pub date: SlotDate,
    pub time: SlotTime,
    pub slot_key: SlotKey,
    pub action: AuditReason,
    pub record: Option<BookingView>,
}

/// One ndjson frame on a subscription stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Slot(SlotEvent),
    Tick(ClockTick),
}
