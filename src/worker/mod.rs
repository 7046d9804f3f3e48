// src/worker/mod.rs

//! Change-detection worker.
//!
//! A single long-lived loop: every tick it re-fetches and re-parses the
//! schedule of every address with at least one subscriber, runs the diff
//! rules, and dispatches notification intents for the day-kinds that
//! changed. One address failing never aborts the tick for the rest.

mod diff;

pub use diff::{ChangedKinds, evaluate, schedule_hash};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use futures::future;

use crate::error::{AppError, Result};
use crate::fetch::Fetcher;
use crate::models::{Address, ScheduleResponse, WorkerConfig};
use crate::notify::{NotificationPayload, NotificationSink};
use crate::parser::parse_schedule;
use crate::render::ScheduleRenderer;
use crate::storage::{SubscriptionKind, SubscriptionStore};

/// One-shot notification mute.
///
/// When set, the next tick updates hashes as usual but sends nothing;
/// used to rebase hashes after a format change without waking anyone.
/// Honored once, then auto-reset.
#[derive(Debug, Default)]
pub struct SilenceFlag(AtomicBool);

impl SilenceFlag {
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Atomically read and clear the flag.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Summary of one worker tick.
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// Users who received at least one notification this tick
    pub notified_users: BTreeSet<i64>,
    pub addresses_processed: usize,
    pub addresses_failed: usize,
}

/// The notification worker.
pub struct Worker {
    fetcher: Arc<Fetcher>,
    store: Arc<dyn SubscriptionStore>,
    sink: Arc<dyn NotificationSink>,
    renderer: Arc<dyn ScheduleRenderer>,
    config: WorkerConfig,
    silence: Arc<SilenceFlag>,
}

impl Worker {
    pub fn new(
        fetcher: Arc<Fetcher>,
        store: Arc<dyn SubscriptionStore>,
        sink: Arc<dyn NotificationSink>,
        renderer: Arc<dyn ScheduleRenderer>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            fetcher,
            store,
            sink,
            renderer,
            config,
            silence: Arc::default(),
        }
    }

    /// Handle to the one-shot silence flag, for an admin surface.
    pub fn silence_flag(&self) -> Arc<SilenceFlag> {
        Arc::clone(&self.silence)
    }

    /// Tick forever on the configured interval.
    pub async fn run(&self) {
        let interval = Duration::from_secs(self.config.interval_secs);
        loop {
            let outcome = self.tick().await;
            log::info!(
                "Tick completed: {} address(es), {} failure(s), {} user(s) notified",
                outcome.addresses_processed,
                outcome.addresses_failed,
                outcome.notified_users.len()
            );
            tokio::time::sleep(interval).await;
        }
    }

    /// Process every subscribed address once.
    pub async fn tick(&self) -> TickOutcome {
        let silenced = self.silence.get();
        let mut outcome = TickOutcome::default();

        let addresses = match self.store.get_all_addresses().await {
            Ok(addresses) => addresses,
            Err(e) => {
                log::error!("Failed to enumerate subscribed addresses: {e}");
                return outcome;
            }
        };

        // Launched as one batch; total outbound concurrency is bounded by
        // the fetcher's semaphore, not per address.
        let jobs: Vec<_> = addresses
            .iter()
            .map(|addr_id| {
                let addr_id = addr_id.clone();
                async move {
                    let result = self.process_address(&addr_id, silenced).await;
                    (addr_id, result)
                }
            })
            .collect();

        for (addr_id, result) in future::join_all(jobs).await {
            outcome.addresses_processed += 1;
            match result {
                Ok(users) => outcome.notified_users.extend(users),
                Err(e) if e.is_skippable() => {
                    outcome.addresses_failed += 1;
                    log::warn!("Skipping address {addr_id} this tick: {e}");
                }
                Err(e) => {
                    outcome.addresses_failed += 1;
                    log::error!("Failed to process address {addr_id}: {e}");
                }
            }
        }

        if let Err(e) = self.sink.refresh_menu(&outcome.notified_users).await {
            log::error!("Failed to refresh service menus: {e}");
        }

        if silenced && self.silence.take() {
            log::info!("Silent hash recalculation honored; notifications were suppressed");
        }

        outcome
    }

    async fn process_address(&self, addr_id: &str, silenced: bool) -> Result<BTreeSet<i64>> {
        let mut notified = BTreeSet::new();

        let subscribers_today = self
            .store
            .get_subscribers(addr_id, SubscriptionKind::Today)
            .await?;
        let subscribers_tomorrow = self
            .store
            .get_subscribers(addr_id, SubscriptionKind::Tomorrow)
            .await?;
        if subscribers_today.is_empty() && subscribers_tomorrow.is_empty() {
            return Ok(notified);
        }

        let (city_id, street_id, house_id) = Address::parse_id(addr_id)
            .ok_or_else(|| AppError::validation(format!("malformed address id {addr_id}")))?;

        let markup = self
            .fetcher
            .schedule_markup(city_id, street_id, house_id)
            .await?;

        // Any subscriber's address book resolves the display name.
        let any_subscriber = subscribers_today
            .iter()
            .chain(subscribers_tomorrow.iter())
            .next()
            .copied()
            .ok_or_else(|| AppError::storage("subscriber set emptied mid-tick"))?;
        let address = self
            .store
            .get_address_by_id(any_subscriber, addr_id)
            .await?
            .ok_or_else(|| {
                AppError::storage(format!("address {addr_id} not found in any address book"))
            })?;

        let today = Local::now().date_naive();
        let schedule = parse_schedule(
            &markup,
            &address.display_name(),
            self.config.max_days,
            today,
        );

        let mut changed = evaluate(self.store.as_ref(), addr_id, &schedule, today).await?;
        if silenced {
            changed.clear();
        }

        if changed.today {
            let payload = self.payload_for(&schedule, SubscriptionKind::Today, today, &address);
            self.dispatch(
                &subscribers_today,
                SubscriptionKind::Today,
                &payload,
                &mut notified,
            )
            .await;
        }

        if changed.tomorrow {
            let tomorrow = today.succ_opt().unwrap_or(today);
            let payload =
                self.payload_for(&schedule, SubscriptionKind::Tomorrow, tomorrow, &address);
            self.dispatch(
                &subscribers_tomorrow,
                SubscriptionKind::Tomorrow,
                &payload,
                &mut notified,
            )
            .await;
        }

        Ok(notified)
    }

    fn payload_for(
        &self,
        schedule: &ScheduleResponse,
        kind: SubscriptionKind,
        date: NaiveDate,
        address: &Address,
    ) -> NotificationPayload {
        let name = address.display_name();
        let message = match kind {
            SubscriptionKind::Today => {
                format!("⚡ Оновлено графік відключень на сьогодні за адресою {name}.")
            }
            SubscriptionKind::Tomorrow => {
                format!("📅 З'явився/оновився графік на завтра за адресою {name}.")
            }
        };

        let rendered = self.renderer.render_day(
            schedule.day_for(date),
            schedule.current_disconnection.as_ref(),
            &schedule.disconnection_queue,
            date,
            &name,
        );

        NotificationPayload { message, rendered }
    }

    /// Deliver one payload to a kind's subscribers; delivery failures are
    /// logged per user and never abort the batch.
    async fn dispatch(
        &self,
        users: &BTreeSet<i64>,
        kind: SubscriptionKind,
        payload: &NotificationPayload,
        notified: &mut BTreeSet<i64>,
    ) {
        for &user_id in users {
            if let Err(e) = self.sink.send(user_id, kind, payload).await {
                log::error!("Failed to deliver {kind} notification to user {user_id}: {e}");
            }
            notified.insert(user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Config, LookupItem};
    use crate::notify::NotificationPayload;
    use crate::render::TextRenderer;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(i64, SubscriptionKind, String)>>,
        menu_refreshes: Mutex<Vec<BTreeSet<i64>>>,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<(i64, SubscriptionKind, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(
            &self,
            user_id: i64,
            kind: SubscriptionKind,
            payload: &NotificationPayload,
        ) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((user_id, kind, payload.message.clone()));
            Ok(())
        }

        async fn refresh_menu(&self, user_ids: &BTreeSet<i64>) -> Result<()> {
            self.menu_refreshes.lock().unwrap().push(user_ids.clone());
            Ok(())
        }
    }

    /// Schedule markup for two day columns labeled with the real today and
    /// tomorrow; `today_off`/`tomorrow_off` put one full-hour outage into
    /// the matching day.
    fn markup(today_off: bool, tomorrow_off: bool) -> String {
        let today = Local::now().date_naive();
        let tomorrow = today.succ_opt().unwrap();

        let mut html = format!(
            r#"<div class="disconnection-detailed-table"><p>6.2 черга</p></div>
               <div class="disconnection-detailed-table-container">
                 <div class="day_col">Дн {}</div>
                 <div class="day_col">Дн {}</div>"#,
            today.format("%d.%m"),
            tomorrow.format("%d.%m"),
        );
        for day_off in [today_off, tomorrow_off] {
            for hour in 0..24 {
                if day_off && hour == 10 {
                    html.push_str(
                        r#"<div class="disconnection-detailed-table-cell cell has_disconnection full_hour confirm_1"></div>"#,
                    );
                } else {
                    html.push_str(r#"<div class="disconnection-detailed-table-cell cell"></div>"#);
                }
            }
        }
        html.push_str("</div>");
        html
    }

    fn insert_payload(markup: &str) -> serde_json::Value {
        json!([{"command": "insert", "data": markup}])
    }

    fn sample_address(city: i64, street: i64, house: i64) -> Address {
        Address {
            city: LookupItem {
                id: city,
                name: "Вінниця".to_string(),
            },
            street: LookupItem {
                id: street,
                name: "вул. Соборна".to_string(),
            },
            house: LookupItem {
                id: house,
                name: "15".to_string(),
            },
        }
    }

    async fn build_worker(
        server: &MockServer,
    ) -> (Worker, Arc<MemoryStore>, Arc<RecordingSink>) {
        let mut config = Config::default();
        config.fetcher.base_url = server.uri();
        config.fetcher.timeout_secs = 5;
        config.fetcher.max_retries = 0;
        config.fetcher.base_delay_ms = 1;

        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let worker = Worker::new(
            Arc::new(Fetcher::new(&config).unwrap()),
            Arc::clone(&store) as Arc<dyn SubscriptionStore>,
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            Arc::new(TextRenderer),
            config.worker.clone(),
        );
        (worker, store, sink)
    }

    async fn subscribe_both_kinds(store: &MemoryStore, addr: &Address, user: i64) {
        store.add_address(user, addr).await.unwrap();
        store
            .add_subscription(user, &addr.id(), SubscriptionKind::Today)
            .await
            .unwrap();
        store
            .add_subscription(user, &addr.id(), SubscriptionKind::Tomorrow)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_first_tick_suppresses_today_but_announces_tomorrow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/disconnection/detailed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(insert_payload(&markup(true, true))),
            )
            .mount(&server)
            .await;

        let (worker, store, sink) = build_worker(&server).await;
        let addr = sample_address(1, 2, 3);
        subscribe_both_kinds(&store, &addr, 100).await;

        let outcome = worker.tick().await;

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 100);
        assert_eq!(sent[0].1, SubscriptionKind::Tomorrow);
        assert!(sent[0].2.contains("на завтра"));
        assert_eq!(
            outcome.notified_users.iter().copied().collect::<Vec<_>>(),
            vec![100]
        );

        // Today's baseline was stored silently
        assert!(
            store
                .get_last_hash("1-2-3", SubscriptionKind::Today)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_today_change_notifies_on_second_tick() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/disconnection/detailed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(insert_payload(&markup(false, false))),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/disconnection/detailed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(insert_payload(&markup(true, false))),
            )
            .mount(&server)
            .await;

        let (worker, store, sink) = build_worker(&server).await;
        let addr = sample_address(1, 2, 3);
        subscribe_both_kinds(&store, &addr, 100).await;

        worker.tick().await;
        assert!(sink.sent().is_empty());

        worker.tick().await;
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, SubscriptionKind::Today);
        assert!(sent[0].2.contains("на сьогодні"));
    }

    #[tokio::test]
    async fn test_silence_flag_mutes_one_tick_and_resets() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/disconnection/detailed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(insert_payload(&markup(false, false))),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/disconnection/detailed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(insert_payload(&markup(true, true))),
            )
            .mount(&server)
            .await;

        let (worker, store, sink) = build_worker(&server).await;
        let addr = sample_address(1, 2, 3);
        subscribe_both_kinds(&store, &addr, 100).await;

        worker.tick().await;

        // Both kinds change next tick, but the flag mutes everything
        worker.silence_flag().set();
        worker.tick().await;
        assert!(sink.sent().is_empty());
        assert!(!worker.silence_flag().get());

        // Hashes were rebased during the silent tick: nothing fires now
        worker.tick().await;
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failing_address_does_not_abort_tick() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/disconnection/detailed"))
            .and(query_param("city_id", "1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/disconnection/detailed"))
            .and(query_param("city_id", "7"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(insert_payload(&markup(false, true))),
            )
            .mount(&server)
            .await;

        let (worker, store, sink) = build_worker(&server).await;
        let broken = sample_address(1, 2, 3);
        let healthy = sample_address(7, 8, 9);
        subscribe_both_kinds(&store, &broken, 100).await;
        subscribe_both_kinds(&store, &healthy, 200).await;

        let outcome = worker.tick().await;

        assert_eq!(outcome.addresses_processed, 2);
        assert_eq!(outcome.addresses_failed, 1);

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 200);

        // The failed address keeps no hash and will be re-evaluated
        assert!(
            store
                .get_last_hash("1-2-3", SubscriptionKind::Today)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_menu_refreshed_once_with_notified_users() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/disconnection/detailed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(insert_payload(&markup(false, true))),
            )
            .mount(&server)
            .await;

        let (worker, store, sink) = build_worker(&server).await;
        let addr = sample_address(1, 2, 3);
        subscribe_both_kinds(&store, &addr, 100).await;
        store
            .add_subscription(300, &addr.id(), SubscriptionKind::Tomorrow)
            .await
            .unwrap();

        worker.tick().await;

        let refreshes = sink.menu_refreshes.lock().unwrap().clone();
        assert_eq!(refreshes.len(), 1);
        assert_eq!(
            refreshes[0].iter().copied().collect::<Vec<_>>(),
            vec![100, 300]
        );
    }
}
