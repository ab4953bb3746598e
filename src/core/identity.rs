//! Identity atoms
//!
//! SlotDate/SlotTime: the canonical (date, time) pair naming a bookable slot
//! SlotKey: the pair plus its derived `{date}_{time}` string form
//! DeviceId: capability token identifying a booking client
//! DisplayName: who the slot shows as booked by

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Time};

use super::error::InvalidInput;

/// Minutes between bookable slots. Slot times must land on this grid.
pub const GRID_MINUTES: u8 = 15;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Calendar date of a slot, canonical text form `YYYY-MM-DD`.
///
/// The text form never contains `_`, so the derived slot-key string splits
/// back into its parts losslessly.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotDate(Date);

impl SlotDate {
    pub fn parse(s: &str) -> Result<Self, InvalidInput> {
        Date::parse(s, DATE_FORMAT)
            .map(Self)
            .map_err(|e| InvalidInput::Date {
                raw: s.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn from_date(date: Date) -> Self {
        Self(date)
    }

    pub fn date(&self) -> Date {
        self.0
    }
}

impl fmt::Display for SlotDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl fmt::Debug for SlotDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotDate({self})")
    }
}

/// Time-of-day of a slot on the 15-minute grid, canonical text form `HH:MM`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(Time);

impl SlotTime {
    pub fn parse(s: &str) -> Result<Self, InvalidInput> {
        let invalid = |reason: &str| InvalidInput::Time {
            raw: s.to_string(),
            reason: reason.to_string(),
        };
        let Some((h, m)) = s.split_once(':') else {
            return Err(invalid("expected HH:MM"));
        };
        if h.len() != 2 || m.len() != 2 {
            return Err(invalid("expected HH:MM"));
        }
        let hour: u8 = h.parse().map_err(|_| invalid("expected HH:MM"))?;
        let minute: u8 = m.parse().map_err(|_| invalid("expected HH:MM"))?;
        let time =
            Time::from_hms(hour, minute, 0).map_err(|_| invalid("hour or minute out of range"))?;
        Self::from_time(time)
    }

    /// Accepts only times that land exactly on the grid.
    pub fn from_time(time: Time) -> Result<Self, InvalidInput> {
        if time.second() != 0 || time.minute() % GRID_MINUTES != 0 {
            return Err(InvalidInput::Time {
                raw: format!("{:02}:{:02}:{:02}", time.hour(), time.minute(), time.second()),
                reason: format!("not on the {GRID_MINUTES}-minute grid"),
            });
        }
        Ok(Self(time))
    }

    pub fn time(&self) -> Time {
        self.0
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

impl fmt::Debug for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotTime({self})")
    }
}

/// Unique identity of a bookable slot.
///
/// The canonical model is the (date, time) pair; the `{date}_{time}` string
/// is a derived representation used as the store's primary key and must stay
/// losslessly reversible.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub date: SlotDate,
    pub time: SlotTime,
}

impl SlotKey {
    pub fn new(date: SlotDate, time: SlotTime) -> Self {
        Self { date, time }
    }

    pub fn parse(s: &str) -> Result<Self, InvalidInput> {
        let Some((date_raw, time_raw)) = s.split_once('_') else {
            return Err(InvalidInput::SlotKey {
                raw: s.to_string(),
                reason: "missing '_' separator".to_string(),
            });
        };
        let date = SlotDate::parse(date_raw).map_err(|e| InvalidInput::SlotKey {
            raw: s.to_string(),
            reason: e.to_string(),
        })?;
        let time = SlotTime::parse(time_raw).map_err(|e| InvalidInput::SlotKey {
            raw: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { date, time })
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.date, self.time)
    }
}

impl fmt::Debug for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotKey({self})")
    }
}

/// Opaque token identifying the booking client.
///
/// Possession authorizes self-cancellation, so the token is validated on the
/// way in (10-100 chars of `[A-Za-z0-9_-]`) and never echoed in errors.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn parse(s: &str) -> Result<Self, InvalidInput> {
        if s.len() < 10 || s.len() > 100 {
            return Err(InvalidInput::DeviceId {
                reason: format!("length {} outside 10-100", s.len()),
            });
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(InvalidInput::DeviceId {
                reason: "contains characters outside [A-Za-z0-9_-]".to_string(),
            });
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId(..{} chars)", self.0.len())
    }
}

/// Display string a booking shows under, 1-50 characters, arbitrary content.
///
/// Profanity masking is a display concern; the server stores the name
/// verbatim.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn parse(s: &str) -> Result<Self, InvalidInput> {
        let chars = s.chars().count();
        if chars == 0 {
            return Err(InvalidInput::DisplayName {
                reason: "empty".to_string(),
            });
        }
        if chars > 50 {
            return Err(InvalidInput::DisplayName {
                reason: format!("length {chars} exceeds 50"),
            });
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayName({:?})", self.0)
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// String-form serde for the key types: slot identities are map keys in the
// snapshot and in API payloads, so they serialize as their canonical text.

macro_rules! string_serde {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                $ty::parse(&raw).map_err(D::Error::custom)
            }
        }

        impl FromStr for $ty {
            type Err = InvalidInput;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::parse(s)
            }
        }
    };
}

string_serde!(SlotDate);
string_serde!(SlotTime);
string_serde!(SlotKey);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_date_round_trips() {
        let date = SlotDate::parse("2025-11-03").unwrap();
        assert_eq!(date.to_string(), "2025-11-03");
    }

    #[test]
    fn slot_date_rejects_garbage() {
        assert!(SlotDate::parse("2025/11/03").is_err());
        assert!(SlotDate::parse("not-a-date").is_err());
        assert!(SlotDate::parse("2025-13-40").is_err());
    }

    #[test]
    fn slot_time_enforces_grid() {
        assert!(SlotTime::parse("09:15").is_ok());
        assert!(SlotTime::parse("09:07").is_err());
        assert!(SlotTime::parse("24:00").is_err());
    }

    #[test]
    fn slot_key_splits_losslessly() {
        let key = SlotKey::parse("2025-11-03_09:15").unwrap();
        assert_eq!(key.date.to_string(), "2025-11-03");
        assert_eq!(key.time.to_string(), "09:15");
        assert_eq!(key.to_string(), "2025-11-03_09:15");
    }

    #[test]
    fn slot_key_rejects_missing_separator() {
        assert!(SlotKey::parse("2025-11-03 09:15").is_err());
    }

    #[test]
    fn device_id_bounds() {
        assert!(DeviceId::parse("dev0000001").is_ok());
        assert!(DeviceId::parse("short").is_err());
        assert!(DeviceId::parse(&"x".repeat(101)).is_err());
        assert!(DeviceId::parse("dev 000001").is_err());
        assert!(DeviceId::parse("dev-0000_1").is_ok());
    }

    #[test]
    fn display_name_bounds() {
        assert!(DisplayName::parse("Ana").is_ok());
        assert!(DisplayName::parse("").is_err());
        assert!(DisplayName::parse(&"n".repeat(51)).is_err());
        // arbitrary content is allowed; masking is a display concern
        assert!(DisplayName::parse("Ana <script>").is_ok());
    }

    #[test]
    fn slot_key_serde_is_string() {
        let key = SlotKey::parse("2025-11-03_09:15").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"2025-11-03_09:15\"");
        let back: SlotKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
