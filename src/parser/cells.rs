// src/parser/cells.rs

//! Hour-cell semantics.
//!
//! A cell's class list decides its outage state:
//! - `has_disconnection` + `full_hour`: the whole hour is off
//! - `has_disconnection` alone: a partial outage described by a nested
//!   `fill` element whose inline style carries `--start`/`--size`
//!   percentages of the 60-minute cell
//! - neither: no outage data
//!
//! `confirm_1`/`confirm_0` mark a confirmed vs tentative outage on the
//! cell; a fill element carries `confirmed` instead.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::models::{FullCell, HalfCell, HourCell};

pub const CLASS_HAS_DISCONNECTION: &str = "has_disconnection";
pub const CLASS_FULL_HOUR: &str = "full_hour";
pub const CLASS_CONFIRMED: &str = "confirmed";

static FILL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.fill").expect("static selector"));

/// Check for a class token on an element.
pub fn has_class(element: &ElementRef, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// Read the confirm flag from a cell's class list.
pub fn confirm_from_classes(element: &ElementRef) -> Option<bool> {
    if has_class(element, "confirm_1") {
        Some(true)
    } else if has_class(element, "confirm_0") {
        Some(false)
    } else {
        None
    }
}

/// Read a numeric custom property like `--start: 25%` from an inline style.
pub fn css_var(style: &str, name: &str) -> Option<f64> {
    static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"--([a-z-]+)\s*:\s*([0-9]+(?:\.[0-9]+)?)%?").expect("static regex")
    });

    PATTERN
        .captures_iter(style)
        .find(|caps| &caps[1] == name)
        .and_then(|caps| caps[2].parse().ok())
}

/// Half-open interval overlap test on minute offsets.
fn overlaps(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    b_start < a_end && b_end > a_start
}

fn fmt_time(hour: u32, minute: u32) -> String {
    format!("{hour:02}:{minute:02}")
}

/// Add minutes to a wall-clock time, wrapping at midnight.
fn add_minutes(hour: u32, minute: u32, delta: u32) -> (u32, u32) {
    let total = (hour * 60 + minute + delta) % (24 * 60);
    (total / 60, total % 60)
}

/// Build an [`HourCell`] from a schedule-table cell element.
///
/// Returns the cell plus whether it contributes any outage to the day.
pub fn build_hour_cell(cell: &ElementRef, hour: u32) -> (HourCell, bool) {
    let full_off =
        has_class(cell, CLASS_HAS_DISCONNECTION) && has_class(cell, CLASS_FULL_HOUR);
    let partially_off = has_class(cell, CLASS_HAS_DISCONNECTION);
    let confirm = confirm_from_classes(cell);

    let (left_start, left_end) = ((hour, 0), add_minutes(hour, 0, 30));
    let (right_start, right_end) = (left_end, add_minutes(hour, 0, 60));

    let make_half = |start: (u32, u32), end: (u32, u32), off: bool, confirm: Option<bool>| {
        HalfCell {
            start: fmt_time(start.0, start.1),
            end: fmt_time(end.0, end.1),
            off: Some(off),
            confirm,
        }
    };

    let halves = if full_off {
        [
            make_half(left_start, left_end, true, confirm),
            make_half(right_start, right_end, true, confirm),
        ]
    } else if partially_off {
        let mut left_off = false;
        let mut right_off = false;
        let mut fill_confirm = None;

        if let Some(fill) = cell.select(&FILL_SELECTOR).next() {
            let style = fill.value().attr("style").unwrap_or("");
            let start_pct = css_var(style, "start").unwrap_or(0.0);
            let size_pct = css_var(style, "size").unwrap_or(0.0);

            let start_min = (start_pct * 60.0 / 100.0) as u32;
            let end_min = (((start_pct + size_pct) * 60.0 / 100.0) as u32).min(60);

            left_off = overlaps(0, 30, start_min, end_min);
            right_off = overlaps(30, 60, start_min, end_min);
            fill_confirm = Some(has_class(&fill, CLASS_CONFIRMED));
        }

        [
            make_half(
                left_start,
                left_end,
                left_off,
                if left_off { fill_confirm } else { None },
            ),
            make_half(
                right_start,
                right_end,
                right_off,
                if right_off { fill_confirm } else { None },
            ),
        ]
    } else {
        [
            make_half(left_start, left_end, false, None),
            make_half(right_start, right_end, false, None),
        ]
    };

    let any_off = halves[0].is_off() || halves[1].is_off();
    let hour_cell = HourCell {
        hour: fmt_time(hour, 0),
        full: FullCell {
            off: Some(full_off || any_off),
            confirm,
        },
        halves,
    };

    (hour_cell, full_off || any_off)
}
