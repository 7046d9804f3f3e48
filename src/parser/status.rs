// src/parser/status.rs

//! Current-disconnection status extraction.
//!
//! The schedule page carries free-text status paragraphs next to the
//! queue label. When an outage is ongoing right now they mention it
//! together with its cause and reported start/recovery times.

use chrono::NaiveDateTime;

use crate::models::CurrentDisconnection;

/// Phrase that marks an ongoing outage.
const OUTAGE_PHRASE: &str = "відсутня електроенергія";
const STARTED_LABEL: &str = "Час початку – ";
const RECOVERY_LABEL: &str = "Орієнтовний час відновлення – до";
const REASON_MARKER: &str = "Причина відключення";
const REASON_LABEL: &str = "Причина відключення: ";
const EMERGENCY_MARKER: &str = "Аварійне";

/// Extract the current-disconnection status from the joined status text.
///
/// Absence of the outage phrase is the normal case, not an error.
pub fn parse_status(nodes: &[String]) -> CurrentDisconnection {
    let raw = nodes.join(" ").trim().to_string();

    if !raw.contains(OUTAGE_PHRASE) {
        return CurrentDisconnection::default();
    }

    let mut is_emergency = None;
    let mut reason = None;

    if raw.contains(REASON_MARKER) {
        if raw.contains(EMERGENCY_MARKER) {
            is_emergency = Some(true);
            reason = Some("Аварійне відключення".to_string());
        } else {
            is_emergency = Some(false);
            reason = raw
                .rsplit(REASON_LABEL)
                .next()
                .and_then(|tail| tail.split("Час").next())
                .map(|r| r.trim().to_string());
        }
    }

    CurrentDisconnection {
        has_disconnection: true,
        is_emergency,
        reason,
        started_at: parse_dt_after(STARTED_LABEL, &raw),
        estimated_end: parse_dt_after(RECOVERY_LABEL, &raw),
    }
}

/// Parse the "HH:MM YYYY.MM.DD" timestamp following `label` in `text`.
fn parse_dt_after(label: &str, text: &str) -> Option<NaiveDateTime> {
    let tail = text.split_once(label)?.1;
    let stamp = tail
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ");
    NaiveDateTime::parse_from_str(&stamp, "%H:%M %Y.%m.%d").ok()
}
