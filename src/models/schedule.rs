//! Parsed schedule data structures.
//!
//! The schedule table is half-hour granular: every hour cell carries a
//! whole-hour summary plus two 30-minute halves.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One 30-minute slot of an hour.
///
/// `off = None` means the source had no data for the slot. `confirm` is
/// meaningful only when `off = Some(true)`: `Some(true)` is a confirmed
/// planned outage, `Some(false)` a tentative one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HalfCell {
    /// Slot start, "HH:MM"
    pub start: String,

    /// Slot end, "HH:MM" (end of hour 23 wraps to "00:00")
    pub end: String,

    pub off: Option<bool>,
    pub confirm: Option<bool>,
}

impl HalfCell {
    /// Whether the slot is a known outage.
    pub fn is_off(&self) -> bool {
        self.off == Some(true)
    }

    /// Whether the outage is confirmed (as opposed to tentative).
    pub fn is_confirmed(&self) -> bool {
        self.confirm == Some(true)
    }
}

/// Whole-hour summary of an [`HourCell`].
///
/// `off` is authoritative when the source marks the hour as uniformly off;
/// otherwise it is the logical OR of the two halves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FullCell {
    pub off: Option<bool>,
    pub confirm: Option<bool>,
}

/// One hour of a day schedule: the full-hour summary plus two halves
/// covering minutes [0,30) and [30,60).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HourCell {
    /// Hour label, "HH:00"
    pub hour: String,

    pub full: FullCell,
    pub halves: [HalfCell; 2],
}

/// The schedule for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaySchedule {
    pub date: NaiveDate,

    /// True iff at least one half or full cell is off
    pub has_disconnections: bool,

    /// Hour cells 00..23, in order (may be shorter on truncated markup)
    pub cells: Vec<HourCell>,
}

/// An outage reported as ongoing right now, extracted from the free-text
/// status nodes rather than from the table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentDisconnection {
    pub has_disconnection: bool,
    pub is_emergency: Option<bool>,
    pub reason: Option<String>,
    pub started_at: Option<NaiveDateTime>,
    pub estimated_end: Option<NaiveDateTime>,
}

/// Everything parsed from one schedule page for one address.
///
/// Produced fresh on every fetch+parse cycle and never mutated after
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleResponse {
    pub address_name: String,

    /// The utility's rotating-shutdown group label, free text
    pub disconnection_queue: String,

    pub current_disconnection: Option<CurrentDisconnection>,

    /// Consecutive calendar days starting today
    pub disconnections: Vec<DaySchedule>,
}

impl ScheduleResponse {
    /// Look up the schedule for a specific calendar day.
    pub fn day_for(&self, date: NaiveDate) -> Option<&DaySchedule> {
        self.disconnections.iter().find(|day| day.date == date)
    }

    /// Whether parsing degraded to an empty schedule.
    pub fn is_empty(&self) -> bool {
        self.disconnections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half(start: &str, end: &str, off: bool) -> HalfCell {
        HalfCell {
            start: start.to_string(),
            end: end.to_string(),
            off: Some(off),
            confirm: None,
        }
    }

    fn day(date: NaiveDate) -> DaySchedule {
        DaySchedule {
            date,
            has_disconnections: false,
            cells: vec![HourCell {
                hour: "00:00".to_string(),
                full: FullCell {
                    off: Some(false),
                    confirm: None,
                },
                halves: [half("00:00", "00:30", false), half("00:30", "01:00", false)],
            }],
        }
    }

    #[test]
    fn test_day_for() {
        let d1 = NaiveDate::from_ymd_opt(2025, 11, 30).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        let response = ScheduleResponse {
            address_name: "Test".to_string(),
            disconnection_queue: "6.2 черга".to_string(),
            current_disconnection: None,
            disconnections: vec![day(d1), day(d2)],
        };

        assert_eq!(response.day_for(d2).unwrap().date, d2);
        assert!(
            response
                .day_for(NaiveDate::from_ymd_opt(2025, 12, 2).unwrap())
                .is_none()
        );
    }

    #[test]
    fn test_half_cell_flags() {
        let mut h = half("10:00", "10:30", true);
        assert!(h.is_off());
        assert!(!h.is_confirmed());
        h.confirm = Some(true);
        assert!(h.is_confirmed());
        h.off = None;
        assert!(!h.is_off());
    }
}
