//! In-memory subscription store.
//!
//! Backs tests and ad-hoc runs; state dies with the process.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::Address;
use crate::storage::{SubscriptionKind, SubscriptionStore};

#[derive(Debug, Default)]
struct Inner {
    subscribers: HashMap<(String, SubscriptionKind), BTreeSet<i64>>,
    hashes: HashMap<(String, SubscriptionKind), String>,
    addresses: HashMap<i64, Vec<Address>>,
}

/// Process-local subscription store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn add_subscription(
        &self,
        user_id: i64,
        addr_id: &str,
        kind: SubscriptionKind,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .subscribers
            .entry((addr_id.to_string(), kind))
            .or_default()
            .insert(user_id);
        Ok(())
    }

    async fn remove_subscription(
        &self,
        user_id: i64,
        addr_id: &str,
        kind: SubscriptionKind,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(users) = inner.subscribers.get_mut(&(addr_id.to_string(), kind)) {
            users.remove(&user_id);
        }
        Ok(())
    }

    async fn get_subscribers(
        &self,
        addr_id: &str,
        kind: SubscriptionKind,
    ) -> Result<BTreeSet<i64>> {
        let inner = self.inner.read().await;
        Ok(inner
            .subscribers
            .get(&(addr_id.to_string(), kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_all_addresses(&self) -> Result<BTreeSet<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .subscribers
            .iter()
            .filter(|(_, users)| !users.is_empty())
            .map(|((addr_id, _), _)| addr_id.clone())
            .collect())
    }

    async fn get_last_hash(
        &self,
        addr_id: &str,
        kind: SubscriptionKind,
    ) -> Result<Option<String>> {
        let inner = self.inner.read().await;
        Ok(inner.hashes.get(&(addr_id.to_string(), kind)).cloned())
    }

    async fn set_last_hash(
        &self,
        addr_id: &str,
        kind: SubscriptionKind,
        value: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .hashes
            .insert((addr_id.to_string(), kind), value.to_string());
        Ok(())
    }

    async fn add_address(&self, user_id: i64, address: &Address) -> Result<()> {
        let mut inner = self.inner.write().await;
        let book = inner.addresses.entry(user_id).or_default();
        book.retain(|a| a.id() != address.id());
        book.push(address.clone());
        Ok(())
    }

    async fn remove_address(&self, user_id: i64, addr_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(book) = inner.addresses.get_mut(&user_id) {
            book.retain(|a| a.id() != addr_id);
        }
        Ok(())
    }

    async fn get_address_by_id(&self, user_id: i64, addr_id: &str) -> Result<Option<Address>> {
        let inner = self.inner.read().await;
        Ok(inner
            .addresses
            .get(&user_id)
            .and_then(|book| book.iter().find(|a| a.id() == addr_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LookupItem;

    fn sample_address() -> Address {
        Address {
            city: LookupItem {
                id: 1,
                name: "Вінниця".to_string(),
            },
            street: LookupItem {
                id: 2,
                name: "вул. Соборна".to_string(),
            },
            house: LookupItem {
                id: 3,
                name: "15".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_subscription_round_trip() {
        let store = MemoryStore::new();
        store
            .add_subscription(100, "1-2-3", SubscriptionKind::Today)
            .await
            .unwrap();
        store
            .add_subscription(200, "1-2-3", SubscriptionKind::Today)
            .await
            .unwrap();

        let subs = store
            .get_subscribers("1-2-3", SubscriptionKind::Today)
            .await
            .unwrap();
        assert_eq!(subs.into_iter().collect::<Vec<_>>(), vec![100, 200]);

        store
            .remove_subscription(100, "1-2-3", SubscriptionKind::Today)
            .await
            .unwrap();
        let subs = store
            .get_subscribers("1-2-3", SubscriptionKind::Today)
            .await
            .unwrap();
        assert_eq!(subs.len(), 1);
    }

    #[tokio::test]
    async fn test_all_addresses_unions_kinds() {
        let store = MemoryStore::new();
        store
            .add_subscription(1, "1-1-1", SubscriptionKind::Today)
            .await
            .unwrap();
        store
            .add_subscription(2, "2-2-2", SubscriptionKind::Tomorrow)
            .await
            .unwrap();

        let addrs = store.get_all_addresses().await.unwrap();
        assert!(addrs.contains("1-1-1"));
        assert!(addrs.contains("2-2-2"));
        assert_eq!(addrs.len(), 2);
    }

    #[tokio::test]
    async fn test_hashes_are_scoped_per_kind() {
        let store = MemoryStore::new();
        store
            .set_last_hash("1-2-3", SubscriptionKind::Today, "aaa")
            .await
            .unwrap();

        let today = store
            .get_last_hash("1-2-3", SubscriptionKind::Today)
            .await
            .unwrap();
        let tomorrow = store
            .get_last_hash("1-2-3", SubscriptionKind::Tomorrow)
            .await
            .unwrap();
        assert_eq!(today.as_deref(), Some("aaa"));
        assert!(tomorrow.is_none());
    }

    #[tokio::test]
    async fn test_address_book_replaces_same_id() {
        let store = MemoryStore::new();
        let addr = sample_address();
        store.add_address(7, &addr).await.unwrap();
        store.add_address(7, &addr).await.unwrap();

        let found = store.get_address_by_id(7, &addr.id()).await.unwrap();
        assert_eq!(found.unwrap().id(), addr.id());
        store.remove_address(7, &addr.id()).await.unwrap();
        assert!(store.get_address_by_id(7, &addr.id()).await.unwrap().is_none());
    }
}
