#![forbid(unsafe_code)]

pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod daemon;
pub mod error;
pub mod paths;
pub mod telemetry;

pub use error::{Effect, Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::core::{
    Action, Actor, AuditReason, BookingRecord, ClockTick, Decision, DeskHours, DeviceId,
    DisplayName, SlotDate, SlotKey, SlotTime, WallClock, authorize, business_days,
};
