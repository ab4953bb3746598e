//! Business-hours calendar: the slot grid and bookable days.
//!
//! Pure and stateless. "Today" is whatever the caller passes in, so tests
//! pin dates and the daemon recomputes per call.

use thiserror::Error;
use time::{Date, Time, Weekday};

use super::identity::{GRID_MINUTES, SlotDate, SlotTime};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidHours {
    #[error("desk hours out of order: {reason}")]
    OutOfOrder { reason: String },
    #[error("desk hours not on the slot grid: {raw}")]
    OffGrid { raw: String },
}

/// Opening hours of the desk: a 15-minute grid from opening to closing with
/// a midday gap carved out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeskHours {
    open: Time,
    close: Time,
    break_start: Time,
    break_end: Time,
}

impl DeskHours {
    pub fn new(
        open: Time,
        close: Time,
        break_start: Time,
        break_end: Time,
    ) -> Result<Self, InvalidHours> {
        for t in [open, close, break_start, break_end] {
            if t.minute() % GRID_MINUTES != 0 || t.second() != 0 {
                return Err(InvalidHours::OffGrid {
                    raw: format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second()),
                });
            }
        }
        if open >= close {
            return Err(InvalidHours::OutOfOrder {
                reason: "opening must precede closing".to_string(),
            });
        }
        if break_start > break_end {
            return Err(InvalidHours::OutOfOrder {
                reason: "break start must not follow break end".to_string(),
            });
        }
        if break_start < open || break_end > close {
            return Err(InvalidHours::OutOfOrder {
                reason: "break must fall within opening hours".to_string(),
            });
        }
        Ok(Self {
            open,
            close,
            break_start,
            break_end,
        })
    }

    /// The ordered slot grid for one day, midday break excluded.
    pub fn slots(&self) -> Vec<SlotTime> {
        let step = u16::from(GRID_MINUTES);
        let mut out = Vec::new();
        let mut mins = minutes_of(self.open);
        let close = minutes_of(self.close);
        let break_start = minutes_of(self.break_start);
        let break_end = minutes_of(self.break_end);
        while mins < close {
            if !(break_start..break_end).contains(&mins) {
                out.push(slot_time_at(mins));
            }
            mins += step;
        }
        out
    }

    /// Whether `time` names a bookable slot on this grid.
    pub fn contains(&self, time: SlotTime) -> bool {
        let mins = minutes_of(time.time());
        mins >= minutes_of(self.open)
            && mins < minutes_of(self.close)
            && !(minutes_of(self.break_start)..minutes_of(self.break_end)).contains(&mins)
    }
}

impl Default for DeskHours {
    /// 09:00-18:00 with a 12:00-14:00 midday break.
    fn default() -> Self {
        Self {
            open: Time::from_hms(9, 0, 0).expect("valid time"),
            close: Time::from_hms(18, 0, 0).expect("valid time"),
            break_start: Time::from_hms(12, 0, 0).expect("valid time"),
            break_end: Time::from_hms(14, 0, 0).expect("valid time"),
        }
    }
}

fn minutes_of(t: Time) -> u16 {
    u16::from(t.hour()) * 60 + u16::from(t.minute())
}

fn slot_time_at(mins: u16) -> SlotTime {
    let time = Time::from_hms((mins / 60) as u8, (mins % 60) as u8, 0).expect("minutes within day");
    SlotTime::from_time(time).expect("grid-aligned by construction")
}

/// Whether bookings are taken on `date` at all.
pub fn is_business_day(date: Date) -> bool {
    !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday)
}

/// Exactly `count` bookable days starting from `from`, weekends skipped.
pub fn business_days(from: Date, count: usize) -> Vec<SlotDate> {
    let mut out = Vec::with_capacity(count);
    let mut day = from;
    while out.len() < count {
        if is_business_day(day) {
            out.push(SlotDate::from_date(day));
        }
        let Some(next) = day.next_day() else { break };
        day = next;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, time};

    #[test]
    fn default_grid_skips_lunch() {
        let hours = DeskHours::default();
        let slots = hours.slots();
        // 09:00-12:00 is 12 slots, 14:00-18:00 is 16
        assert_eq!(slots.len(), 28);
        assert_eq!(slots[0].to_string(), "09:00");
        assert_eq!(slots[11].to_string(), "11:45");
        assert_eq!(slots[12].to_string(), "14:00");
        assert_eq!(slots[27].to_string(), "17:45");
        assert!(!slots.iter().any(|s| s.to_string() == "12:00"));
        assert!(!slots.iter().any(|s| s.to_string() == "13:45"));
    }

    #[test]
    fn contains_matches_grid() {
        let hours = DeskHours::default();
        assert!(hours.contains(SlotTime::parse("09:15").unwrap()));
        assert!(hours.contains(SlotTime::parse("17:45").unwrap()));
        assert!(!hours.contains(SlotTime::parse("12:30").unwrap()));
        assert!(!hours.contains(SlotTime::parse("18:00").unwrap()));
        assert!(!hours.contains(SlotTime::parse("08:45").unwrap()));
    }

    #[test]
    fn hours_validation() {
        assert!(DeskHours::new(
            time!(10:00),
            time!(9:00),
            time!(12:00),
            time!(12:00)
        )
        .is_err());
        assert!(DeskHours::new(
            time!(9:00),
            time!(18:00),
            time!(12:07),
            time!(14:00)
        )
        .is_err());
        assert!(DeskHours::new(
            time!(9:00),
            time!(18:00),
            time!(8:00),
            time!(14:00)
        )
        .is_err());
    }

    #[test]
    fn business_days_skip_weekends() {
        // 2025-11-07 is a Friday
        let days = business_days(date!(2025 - 11 - 07), 3);
        let rendered: Vec<String> = days.iter().map(|d| d.to_string()).collect();
        assert_eq!(rendered, ["2025-11-07", "2025-11-10", "2025-11-11"]);
    }

    #[test]
    fn business_days_starting_on_weekend() {
        // 2025-11-08 is a Saturday
        let days = business_days(date!(2025 - 11 - 08), 2);
        let rendered: Vec<String> = days.iter().map(|d| d.to_string()).collect();
        assert_eq!(rendered, ["2025-11-10", "2025-11-11"]);
    }
}
