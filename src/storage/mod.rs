//! Subscription and hash-record storage.
//!
//! The watcher core only ever does read-then-conditionally-write per
//! (address, kind) key; anything transactional is the backend's concern.

pub mod local;
pub mod memory;

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Address;

// Re-export for convenience
pub use local::LocalStore;
pub use memory::MemoryStore;

/// The two independently tracked notification channels per address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    Today,
    Tomorrow,
}

impl SubscriptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionKind::Today => "today",
            SubscriptionKind::Tomorrow => "tomorrow",
        }
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend for subscriptions, saved addresses and per-kind schedule hashes.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Subscribe a user to schedule changes for an address.
    async fn add_subscription(
        &self,
        user_id: i64,
        addr_id: &str,
        kind: SubscriptionKind,
    ) -> Result<()>;

    /// Remove one subscription; absent subscriptions are ignored.
    async fn remove_subscription(
        &self,
        user_id: i64,
        addr_id: &str,
        kind: SubscriptionKind,
    ) -> Result<()>;

    /// Users subscribed to an address for the given kind.
    async fn get_subscribers(
        &self,
        addr_id: &str,
        kind: SubscriptionKind,
    ) -> Result<BTreeSet<i64>>;

    /// Addresses with at least one subscriber of any kind.
    async fn get_all_addresses(&self) -> Result<BTreeSet<String>>;

    /// Last notified hash for an (address, kind) pair.
    async fn get_last_hash(
        &self,
        addr_id: &str,
        kind: SubscriptionKind,
    ) -> Result<Option<String>>;

    /// Replace the stored hash for an (address, kind) pair.
    async fn set_last_hash(
        &self,
        addr_id: &str,
        kind: SubscriptionKind,
        value: &str,
    ) -> Result<()>;

    /// Save an address into a user's address book, replacing a same-id entry.
    async fn add_address(&self, user_id: i64, address: &Address) -> Result<()>;

    /// Remove an address from a user's address book; absent ids are ignored.
    async fn remove_address(&self, user_id: i64, addr_id: &str) -> Result<()>;

    /// Resolve an address from a user's address book.
    async fn get_address_by_id(&self, user_id: i64, addr_id: &str) -> Result<Option<Address>>;
}
