// src/render.rs

//! Plain-text schedule rendering.
//!
//! Collapses the 48 half-cells of a day into run-length ranges of equal
//! state and appends per-category hour totals.

use chrono::NaiveDate;

use crate::models::{CurrentDisconnection, DaySchedule, HalfCell};

/// Message shown when a previously announced day was withdrawn.
const DAY_CANCELLED: &str =
    "За вашою адресою зафіксовано відміну графіка відключень на цей день.";

/// Renders a day schedule into a notification payload.
pub trait ScheduleRenderer: Send + Sync {
    fn render_day(
        &self,
        day: Option<&DaySchedule>,
        current: Option<&CurrentDisconnection>,
        queue: &str,
        date: NaiveDate,
        address: &str,
    ) -> String;
}

/// The default text renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl ScheduleRenderer for TextRenderer {
    fn render_day(
        &self,
        day: Option<&DaySchedule>,
        current: Option<&CurrentDisconnection>,
        queue: &str,
        date: NaiveDate,
        address: &str,
    ) -> String {
        let Some(day) = day else {
            return DAY_CANCELLED.to_string();
        };

        let mut lines: Vec<String> = vec![
            format!("{queue} · {}", date.format("%d-%m-%Y")),
            format!("📍 {address}"),
            String::new(),
        ];

        if let Some(preamble) = current.and_then(current_disconnection_message) {
            lines.push(preamble);
            lines.push(String::new());
        }

        let halves: Vec<&HalfCell> = day.cells.iter().flat_map(|hour| &hour.halves).collect();

        let mut confirmed_hours = 0.0;
        let mut possible_hours = 0.0;
        let mut index = 0;

        while index < halves.len() {
            let (next, range, hours) =
                consume_range(&halves, index, |h| h.is_off() && h.is_confirmed());
            index = next;
            if let Some(range) = range {
                confirmed_hours += hours;
                lines.push(format!("🟥 {range} — Підтверджене відключення"));
            }

            let (next, range, hours) =
                consume_range(&halves, index, |h| h.is_off() && !h.is_confirmed());
            index = next;
            if let Some(range) = range {
                possible_hours += hours;
                lines.push(format!("🟧 {range} — Можливе відключення"));
            }

            let (next, range, _) = consume_range(&halves, index, |h| !h.is_off());
            index = next;
            if let Some(range) = range {
                lines.push(format!("🟩 {range} — Зі світлом"));
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "Підтверджених відключень: {}",
            format_hours(confirmed_hours)
        ));
        if possible_hours > 0.0 {
            lines.push(format!(
                "Можливих відключень: {}",
                format_hours(possible_hours)
            ));
        }
        let powered = (day.cells.len() as f64) - confirmed_hours - possible_hours;
        lines.push(format!("Зі світлом: {}", format_hours(powered)));

        lines.join("\n")
    }
}

/// Collapse a run of half-cells matching `predicate` starting at `index`.
///
/// Returns the index past the run, the "HH:MM - HH:MM" range if the run is
/// non-empty, and its length in hours.
fn consume_range(
    halves: &[&HalfCell],
    index: usize,
    predicate: impl Fn(&HalfCell) -> bool,
) -> (usize, Option<String>, f64) {
    if index >= halves.len() || !predicate(halves[index]) {
        return (index, None, 0.0);
    }

    let start = &halves[index].start;
    let mut end_index = index;
    while end_index < halves.len() && predicate(halves[end_index]) {
        end_index += 1;
    }
    let end = &halves[end_index - 1].end;
    let hours = (end_index - index) as f64 * 0.5;

    (end_index, Some(format!("{start} - {end}")), hours)
}

/// Ukrainian hour-word agreement: 1 година, 2..4 години, otherwise годин.
fn format_hours(hours: f64) -> String {
    let value = if hours.fract() == 0.0 {
        format!("{}", hours as i64)
    } else {
        format!("{hours}")
    };

    let word = if hours == 1.0 {
        "година"
    } else if (hours > 0.0 && hours < 1.0) || (hours > 1.0 && hours < 5.0) {
        "години"
    } else {
        "годин"
    };

    format!("{value} {word}")
}

/// Preamble describing an outage that is ongoing right now.
fn current_disconnection_message(current: &CurrentDisconnection) -> Option<String> {
    if !current.has_disconnection {
        return None;
    }

    let format_stamp = |stamp: Option<chrono::NaiveDateTime>| {
        stamp
            .map(|s| s.format("%H:%M %d-%m-%Y").to_string())
            .unwrap_or_else(|| "Невідомо".to_string())
    };

    Some(format!(
        "За вашою адресою зараз відсутня електроенергія.\n\
         Причина: {}.\n\
         Час початку: {}.\n\
         Орієнтовний час відновлення: {}.",
        current.reason.as_deref().unwrap_or("Невідома"),
        format_stamp(current.started_at),
        format_stamp(current.estimated_end),
    ))
}
