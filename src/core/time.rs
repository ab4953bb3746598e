//! Wall-clock timestamps and the heartbeat clock snapshot.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Wall-clock timestamp, serialized as RFC 3339 text.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WallClock(OffsetDateTime);

impl WallClock {
    pub fn now() -> Self {
        Self(now_local())
    }

    pub fn from_odt(odt: OffsetDateTime) -> Self {
        Self(odt)
    }

    pub fn as_odt(&self) -> OffsetDateTime {
        self.0
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.format(&Rfc3339).unwrap_or_default()
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl fmt::Debug for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WallClock({self})")
    }
}

impl Serialize for WallClock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WallClock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&raw, &Rfc3339)
            .map(Self)
            .map_err(D::Error::custom)
    }
}

/// Current local time; falls back to UTC when the local offset cannot be
/// determined (multithreaded lookup on some platforms).
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Wall-clock snapshot published on the heartbeat.
///
/// Clients use this for display synchronization only; no business logic
/// depends on its delivery or timing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTick {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub total_minutes: u16,
    pub iso: String,
}

impl ClockTick {
    pub fn now() -> Self {
        Self::at(now_local())
    }

    pub fn at(odt: OffsetDateTime) -> Self {
        Self {
            hours: odt.hour(),
            minutes: odt.minute(),
            seconds: odt.second(),
            total_minutes: u16::from(odt.hour()) * 60 + u16::from(odt.minute()),
            iso: odt.format(&Rfc3339).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn wall_clock_serde_round_trip() {
        let clock = WallClock::from_odt(datetime!(2025-11-03 09:15:00 UTC));
        let json = serde_json::to_string(&clock).unwrap();
        assert_eq!(json, "\"2025-11-03T09:15:00Z\"");
        let back: WallClock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, clock);
    }

    #[test]
    fn clock_tick_totals_minutes() {
        let tick = ClockTick::at(datetime!(2025-11-03 14:30:05 UTC));
        assert_eq!(tick.hours, 14);
        assert_eq!(tick.minutes, 30);
        assert_eq!(tick.seconds, 5);
        assert_eq!(tick.total_minutes, 14 * 60 + 30);
        assert!(tick.iso.starts_with("2025-11-03T14:30:05"));
    }
}
