// src/parser/mod.rs

//! Schedule markup parser.
//!
//! Turns the raw HTML fragment returned by the schedule endpoint into a
//! [`ScheduleResponse`]. Parsing never fails: markup without the expected
//! elements degrades to an empty schedule with an explanatory queue string.

mod cells;
mod day_label;
mod status;

pub use cells::{build_hour_cell, css_var};
pub use day_label::parse_day_label;
pub use status::parse_status;

use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use crate::models::{DaySchedule, ScheduleResponse};

/// Queue string reported when the markup carries no schedule at all.
pub const NO_QUEUE_INFO: &str = "Немає інформації про чергу відключень";

static QUEUE_TEXT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.disconnection-detailed-table p").expect("static selector"));
static TABLE_CONTAINER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.disconnection-detailed-table-container").expect("static selector")
});
static DAY_COLUMN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.day_col").expect("static selector"));
static TABLE_CELL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.disconnection-detailed-table-cell.cell").expect("static selector")
});

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parse raw schedule markup into a structured response.
///
/// `today` anchors day-label year inference and is always the date of the
/// first column; `max_days` caps how many day columns are consumed.
pub fn parse_schedule(
    html: &str,
    address_name: &str,
    max_days: usize,
    today: NaiveDate,
) -> ScheduleResponse {
    let document = Html::parse_document(html);

    let text_nodes: Vec<String> = document
        .select(&QUEUE_TEXT)
        .map(|p| element_text(&p))
        .filter(|text| !text.is_empty())
        .collect();

    let Some(queue) = text_nodes.first().cloned() else {
        log::warn!("No queue text found in the schedule for {address_name}");
        return ScheduleResponse {
            address_name: address_name.to_string(),
            disconnection_queue: NO_QUEUE_INFO.to_string(),
            current_disconnection: None,
            disconnections: Vec::new(),
        };
    };
    let current = parse_status(&text_nodes[1..]);

    let container = document.select(&TABLE_CONTAINER).next();
    let labels: Vec<String> = container
        .map(|c| c.select(&DAY_COLUMN).map(|d| element_text(&d)).collect())
        .unwrap_or_default();

    if labels.is_empty() {
        log::warn!("No day columns found in the schedule for {address_name}");
        return ScheduleResponse {
            address_name: address_name.to_string(),
            disconnection_queue: queue,
            current_disconnection: Some(current),
            disconnections: Vec::new(),
        };
    }

    // Day boundaries come from cell count alone: 24 consecutive cells per
    // day column, row-major across the whole table.
    let cells: Vec<ElementRef> = container
        .map(|c| c.select(&TABLE_CELL).collect())
        .unwrap_or_default();

    let mut disconnections = Vec::new();
    let mut cell_index = 0;

    for (offset, label) in labels.iter().take(max_days).enumerate() {
        let date = parse_day_label(label, today).unwrap_or_else(|| {
            log::warn!("Unparseable day label '{label}', falling back to day offset {offset}");
            today
                .checked_add_days(chrono::Days::new(offset as u64))
                .unwrap_or(today)
        });
        log::debug!("Parsing schedule for {address_name} for {date}");

        let mut day_cells = Vec::new();
        let mut day_has_disconnections = false;

        for hour in 0..24 {
            if cell_index >= cells.len() {
                break;
            }
            let (hour_cell, off) = build_hour_cell(&cells[cell_index], hour);
            cell_index += 1;
            day_has_disconnections |= off;
            day_cells.push(hour_cell);
        }

        disconnections.push(DaySchedule {
            date,
            has_disconnections: day_has_disconnections,
            cells: day_cells,
        });
    }

    if !disconnections.iter().any(|day| day.has_disconnections) {
        log::info!(
            "No disconnections found for {address_name} within {} day(s)",
            disconnections.len()
        );
    }

    ScheduleResponse {
        address_name: address_name.to_string(),
        disconnection_queue: queue,
        current_disconnection: Some(current),
        disconnections,
    }
}
