//! Reservation orchestration: validate, authorize, audit, mutate, publish.
//!
//! The destructive unit (authorize -> audit append -> store remove ->
//! publish) runs under one lock so a single occupancy can never produce two
//! audit rows, and publish order agrees with mutation order.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::api::{
    BookingView, DayBookings, DayInfo, DaysOutput, NamesOutput, ReloadOutput, SlotEvent,
    SlotsOutput, SubscribeInfo,
};
use crate::core::{
    Action, Actor, AuditReason, BookingRecord, ClockTick, Decision, DeskHours, DeviceId,
    DisplayName, SlotDate, SlotKey, SlotTime, WallClock, authorize, business_days, is_business_day,
    time::now_local,
};
use crate::daemon::bus::{BusLimits, BusSubscription, NotificationBus};
use crate::daemon::ledger::{AuditEntry, AuditLedger};
use crate::daemon::names::DisplayNameRoster;
use crate::daemon::ops::{BookOutput, CancelOutput, ExtractOutput, OpError};
use crate::daemon::store::{SlotStore, StoreError};

// =============================================================================
// Request parameter shapes (pre-validation)
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct BookParams {
    pub date: Option<String>,
    pub time: Option<String>,
    pub device_id: Option<String>,
    pub booked_by: Option<String>,
    pub kiosk: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CancelParams {
    pub date: Option<String>,
    pub time: Option<String>,
    pub device_id: Option<String>,
    pub is_admin: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractParams {
    pub slot_key: Option<String>,
    pub reason: Option<String>,
}

// =============================================================================
// Engine
// =============================================================================

pub struct EngineOptions {
    pub snapshot_path: PathBuf,
    pub ledger_root: PathBuf,
    pub names_path: PathBuf,
    pub admin_password: Option<String>,
    pub visible_days: usize,
}

pub struct ReservationEngine {
    hours: DeskHours,
    visible_days: usize,
    admin_password: Option<String>,
    store: SlotStore,
    ledger: AuditLedger,
    bus: NotificationBus,
    roster: DisplayNameRoster,
    // Serializes the destructive unit; see module docs.
    removal: Mutex<()>,
}

impl ReservationEngine {
    pub fn open(
        hours: DeskHours,
        bus_limits: BusLimits,
        options: EngineOptions,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            hours,
            visible_days: options.visible_days,
            admin_password: options.admin_password,
            store: SlotStore::open(options.snapshot_path)?,
            ledger: AuditLedger::new(options.ledger_root),
            bus: NotificationBus::new(bus_limits),
            roster: DisplayNameRoster::load(options.names_path),
            removal: Mutex::new(()),
        })
    }

    pub fn bus(&self) -> NotificationBus {
        self.bus.clone()
    }

    /// Claim a free slot. Creation is open to any actor; the only gates are
    /// shape validity and slot availability.
    pub fn book(&self, params: BookParams) -> Result<BookOutput, OpError> {
        let date = SlotDate::parse(require("date", &params.date)?)?;
        let time = SlotTime::parse(require("time", &params.time)?)?;
        let device_id = DeviceId::parse(require("device_id", &params.device_id)?)?;
        let booked_by = DisplayName::parse(require("booked_by", &params.booked_by)?)?;
        if !is_business_day(date.date()) {
            return Err(OpError::NotABusinessDay { date });
        }
        if !self.hours.contains(time) {
            return Err(OpError::OutsideHours { time });
        }

        let key = SlotKey::new(date, time);
        let record = BookingRecord {
            booked_by,
            device_id,
            booked_at: WallClock::now(),
            kiosk: params.kiosk,
        };
        self.store.try_book(key.clone(), record.clone())?;
        tracing::info!(slot = %key, kiosk = record.kiosk, "booked");

        // Best-effort creation row; the booking's durability is the
        // snapshot, so a ledger failure here is logged and not fatal.
        let entry = AuditEntry::from_record(&key, &record, AuditReason::Booked);
        if let Err(err) = self.ledger.append(&entry) {
            tracing::warn!(slot = %key, "creation audit row failed: {err}");
        }

        self.publish(&key, AuditReason::Booked, Some(&record));
        Ok(BookOutput { key })
    }

    /// Cancel (or, for admins, complete) a booking. The audit row must land
    /// before the store removal; on append failure the booking stays live
    /// and the whole operation is retryable.
    pub fn cancel(&self, params: CancelParams) -> Result<CancelOutput, OpError> {
        let date = SlotDate::parse(require("date", &params.date)?)?;
        let time = SlotTime::parse(require("time", &params.time)?)?;
        let device_id = DeviceId::parse(require("device_id", &params.device_id)?)?;
        let reason = match params.reason.as_deref() {
            None => AuditReason::Cancelled,
            Some(raw) => match AuditReason::parse(raw)? {
                reason @ (AuditReason::Cancelled | AuditReason::Completed) => reason,
                other => {
                    return Err(OpError::Invalid(crate::core::InvalidInput::Reason {
                        raw: other.as_str().to_string(),
                        reason: "cancel accepts cancelled or completed".to_string(),
                    }));
                }
            },
        };
        let action = match reason {
            AuditReason::Completed => Action::Complete,
            _ => Action::Cancel,
        };
        let actor = Actor::device(device_id, params.is_admin);

        let key = SlotKey::new(date, time);
        let _unit = self.lock_removal();
        let Some(record) = self.store.get(&key) else {
            return Err(OpError::NotFound { key });
        };
        if let Decision::Deny(denial) = authorize(action, &record, &actor) {
            tracing::info!(slot = %key, "{denial}");
            return Err(OpError::Forbidden { denial });
        }

        let ledger_file = self.remove_with_audit(&key, &record, reason)?;
        Ok(CancelOutput {
            key,
            audit_written: true,
            ledger_file,
            reason,
        })
    }

    /// Administrative forced removal with audit; bypasses the
    /// device-ownership check by acting as the admin actor.
    pub fn extract(&self, params: ExtractParams) -> Result<ExtractOutput, OpError> {
        let key = SlotKey::parse(require("slot_key", &params.slot_key)?)?;
        let reason = match params.reason.as_deref() {
            None => AuditReason::Extracted,
            Some(raw) => AuditReason::parse(raw)?,
        };

        let _unit = self.lock_removal();
        let Some(record) = self.store.get(&key) else {
            return Err(OpError::NotFound { key });
        };
        debug_assert!(matches!(
            authorize(Action::Extract, &record, &Actor::admin()),
            Decision::Allow
        ));

        let ledger_file = self.remove_with_audit(&key, &record, reason)?;
        Ok(ExtractOutput {
            key,
            ledger_file,
            reason,
        })
    }

    pub fn bookings_for_day(&self, date: Option<String>) -> Result<DayBookings, OpError> {
        let date = SlotDate::parse(require("date", &date)?)?;
        let bookings = self
            .store
            .list_for_day(date)
            .iter()
            .map(|(time, record)| (*time, BookingView::from(record)))
            .collect();
        Ok(DayBookings { date, bookings })
    }

    pub fn days(&self, count: Option<usize>) -> DaysOutput {
        let today = now_local().date();
        let days = business_days(today, count.unwrap_or(self.visible_days))
            .into_iter()
            .map(|date| {
                let weekday = short(date.date().weekday().to_string());
                let month = short(date.date().month().to_string());
                DayInfo {
                    label: format!("{weekday} {:02} {month}", date.date().day()),
                    weekday,
                    date,
                }
            })
            .collect();
        DaysOutput { days }
    }

    pub fn slots(&self) -> SlotsOutput {
        SlotsOutput {
            slots: self.hours.slots(),
        }
    }

    pub fn now(&self) -> ClockTick {
        ClockTick::now()
    }

    pub fn names(&self) -> NamesOutput {
        let names = self.roster.names();
        NamesOutput {
            count: names.len(),
            names: names.as_ref().clone(),
        }
    }

    pub fn reload_names(&self) -> Result<ReloadOutput, OpError> {
        let count = self.roster.reload()?;
        Ok(ReloadOutput { count })
    }

    pub fn admin_verify(&self, password: Option<String>) -> Result<(), OpError> {
        let Some(expected) = self.admin_password.as_deref() else {
            return Err(OpError::AdminDisabled);
        };
        let supplied = require("password", &password)?;
        if supplied != expected {
            return Err(OpError::AdminRejected);
        }
        Ok(())
    }

    pub fn subscribe(
        &self,
        date: Option<String>,
    ) -> Result<(SubscribeInfo, BusSubscription), OpError> {
        let date = SlotDate::parse(require("date", &date)?)?;
        let subscription = self.bus.subscribe(date)?;
        Ok((SubscribeInfo { date }, subscription))
    }

    pub fn booked_count(&self) -> usize {
        self.store.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count().unwrap_or(0)
    }

    /// Append-then-delete: the one ordering the audit trail depends on.
    /// Caller holds the removal lock and has already authorized.
    fn remove_with_audit(
        &self,
        key: &SlotKey,
        record: &BookingRecord,
        reason: AuditReason,
    ) -> Result<String, OpError> {
        let entry = AuditEntry::from_record(key, record, reason);
        let path = self.ledger.append(&entry)?;
        let removed = self.store.remove(key)?;
        if removed.is_none() {
            // Unreachable under the removal lock; worth a trace if it ever
            // fires because it means a second audit row for one occupancy.
            tracing::error!(slot = %key, "booking vanished between audit append and removal");
        }
        tracing::info!(slot = %key, reason = %reason, "removed");
        self.publish(key, reason, Some(record));
        Ok(path.display().to_string())
    }

    fn publish(&self, key: &SlotKey, action: AuditReason, record: Option<&BookingRecord>) {
        let event = SlotEvent {
            date: key.date,
            time: key.time,
            slot_key: key.clone(),
            action,
            record: record.map(BookingView::from),
        };
        if let Err(err) = self.bus.publish_slot(event) {
            tracing::warn!(slot = %key, "publish failed: {err}");
        }
    }

    fn lock_removal(&self) -> MutexGuard<'_, ()> {
        self.removal.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn require<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, OpError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(OpError::MissingField { field }),
    }
}

fn short(mut name: String) -> String {
    name.truncate(3);
    name
}
