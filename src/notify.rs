// src/notify.rs

//! Notification dispatch boundary.
//!
//! The worker produces notification intents; delivery transport (chat bot,
//! e-mail, ...) lives behind [`NotificationSink`].

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::storage::SubscriptionKind;

/// One rendered notification for one day-kind of one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    /// Short headline naming the address and day-kind
    pub message: String,

    /// Rendered day schedule
    pub rendered: String,
}

/// Delivery transport for notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a payload to one user.
    async fn send(
        &self,
        user_id: i64,
        kind: SubscriptionKind,
        payload: &NotificationPayload,
    ) -> Result<()>;

    /// Refresh the service menu for every notified user, once per tick.
    async fn refresh_menu(&self, user_ids: &BTreeSet<i64>) -> Result<()>;
}

/// Sink that only logs deliveries; backs CLI runs without a transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(
        &self,
        user_id: i64,
        kind: SubscriptionKind,
        payload: &NotificationPayload,
    ) -> Result<()> {
        log::info!("[{kind}] -> {user_id}: {}", payload.message);
        log::debug!("{}", payload.rendered);
        Ok(())
    }

    async fn refresh_menu(&self, user_ids: &BTreeSet<i64>) -> Result<()> {
        if !user_ids.is_empty() {
            log::info!("Would refresh the menu for {} user(s)", user_ids.len());
        }
        Ok(())
    }
}
