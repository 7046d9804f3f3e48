//! Per-(address, kind) change detection.
//!
//! Decides, from the freshly parsed schedule and the stored hashes,
//! which day-kinds deserve a notification this tick. The rules are
//! deliberately asymmetric:
//!
//! - **today**: a first sighting only stores a baseline (a user who just
//!   subscribed is not greeted with the schedule they already saw); later
//!   divergence notifies. A day that disappears after being announced
//!   notifies once and rebases the hash to "".
//! - **tomorrow**: a first sighting with disconnections notifies right
//!   away; the appearance of tomorrow's schedule is itself the event.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{DaySchedule, ScheduleResponse};
use crate::storage::{SubscriptionKind, SubscriptionStore};

/// Day-kinds marked changed by one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangedKinds {
    pub today: bool,
    pub tomorrow: bool,
}

impl ChangedKinds {
    pub fn any(&self) -> bool {
        self.today || self.tomorrow
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Content hash of one day schedule.
///
/// Any change to a single half's `off` or `confirm` value changes the
/// hash; hashing the same content twice yields the same hash.
pub fn schedule_hash(day: &DaySchedule) -> Result<String> {
    let json = serde_json::to_string(day)?;
    Ok(hex::encode(Sha256::digest(json.as_bytes())))
}

/// Run the state-machine transitions for one address and update the
/// stored hashes.
///
/// A hash is only written after the full fetch+parse completed, so an
/// aborted cycle never leaves a partial record behind.
pub async fn evaluate(
    store: &dyn SubscriptionStore,
    addr_id: &str,
    schedule: &ScheduleResponse,
    today: NaiveDate,
) -> Result<ChangedKinds> {
    let tomorrow = today.succ_opt().unwrap_or(today);

    // Read both baselines before any update: the rollover dedup below
    // must compare against yesterday's stored "tomorrow", not this tick's.
    let today_old = store
        .get_last_hash(addr_id, SubscriptionKind::Today)
        .await?;
    let tomorrow_old = store
        .get_last_hash(addr_id, SubscriptionKind::Tomorrow)
        .await?;

    let mut changed = ChangedKinds::default();
    let mut today_hash = None;

    match schedule.day_for(today) {
        Some(day) => {
            let hash = schedule_hash(day)?;
            match &today_old {
                None => {
                    store
                        .set_last_hash(addr_id, SubscriptionKind::Today, &hash)
                        .await?;
                }
                Some(old) if *old != hash => {
                    store
                        .set_last_hash(addr_id, SubscriptionKind::Today, &hash)
                        .await?;
                    changed.today = true;
                }
                _ => {}
            }
            log::debug!("Today hash for {addr_id}: {hash}, old: {today_old:?}");
            today_hash = Some(hash);
        }
        None => {
            // An announced day vanished from the response; an already
            // empty baseline does not re-trigger.
            if today_old.as_deref().is_some_and(|old| !old.is_empty()) {
                store
                    .set_last_hash(addr_id, SubscriptionKind::Today, "")
                    .await?;
                changed.today = true;
                log::debug!("Today schedule for {addr_id} removed, old hash: {today_old:?}");
            }
        }
    }

    if let Some(day) = schedule.day_for(tomorrow) {
        let hash = schedule_hash(day)?;
        if tomorrow_old.as_deref() != Some(hash.as_str()) && day.has_disconnections {
            store
                .set_last_hash(addr_id, SubscriptionKind::Tomorrow, &hash)
                .await?;
            changed.tomorrow = true;
        }
        log::debug!("Tomorrow hash for {addr_id}: {hash}, old: {tomorrow_old:?}");
    }

    // Day rollover: today's content was already announced yesterday as
    // "tomorrow's" schedule; notifying again would be a duplicate.
    if changed.today && today_hash.is_some() && today_hash.as_deref() == tomorrow_old.as_deref() {
        changed.today = false;
    }

    Ok(changed)
}
