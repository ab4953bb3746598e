//! Pure domain core: identities, booking records, authorization, calendar.
//!
//! Nothing in here touches the filesystem or holds locks; the stateful side
//! lives in `crate::daemon`.

pub mod authorize;
pub mod booking;
pub mod calendar;
pub mod error;
pub mod identity;
pub mod time;

pub use authorize::{Action, Actor, Decision, Denial, DenyReason, authorize};
pub use booking::{AuditReason, BookingRecord};
pub use calendar::{DeskHours, InvalidHours, business_days, is_business_day};
pub use error::{CoreError, ErrorCode, InvalidInput};
pub use identity::{DeviceId, DisplayName, GRID_MINUTES, SlotDate, SlotKey, SlotTime};
pub use time::{ClockTick, WallClock};
