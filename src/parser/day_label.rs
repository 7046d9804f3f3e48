// src/parser/day_label.rs

//! Day-column label parsing.
//!
//! Column headers look like "Пн 01.12": weekday plus day and month, with
//! no year. The year is inferred from today's date.

use chrono::{Datelike, NaiveDate};

/// Parse a "<weekday> DD.MM" label into a concrete date.
///
/// The current year is substituted; a date that would land before `today`
/// rolls forward one year (the table never reaches back, so a "01.01"
/// column seen in late December belongs to the next year).
pub fn parse_day_label(label: &str, today: NaiveDate) -> Option<NaiveDate> {
    let token = label.split_whitespace().last()?;
    let mut parts = token.split('.');
    let day: u32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;

    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(date) if date >= today => Some(date),
        // Past date, or invalid in the current year (Feb 29)
        _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_same_year() {
        let today = date(2025, 11, 29);
        assert_eq!(
            parse_day_label("Сб 29.11", today),
            Some(date(2025, 11, 29))
        );
        assert_eq!(
            parse_day_label("Нд 30.11", today),
            Some(date(2025, 11, 30))
        );
    }

    #[test]
    fn test_parse_rolls_over_year_end() {
        let today = date(2025, 12, 30);
        assert_eq!(parse_day_label("Пн 01.01", today), Some(date(2026, 1, 1)));
    }

    #[test]
    fn test_parse_leap_day_next_year() {
        let today = date(2027, 12, 31);
        assert_eq!(parse_day_label("Вт 29.02", today), Some(date(2028, 2, 29)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let today = date(2025, 11, 29);
        assert_eq!(parse_day_label("", today), None);
        assert_eq!(parse_day_label("Сб", today), None);
        assert_eq!(parse_day_label("Сб 45.19", today), None);
    }
}
