//! Local JSON-file subscription store.
//!
//! Keeps the whole store in memory and rewrites the backing file on every
//! mutation, atomically (write to temp, then rename) so a crash mid-write
//! never corrupts persisted hashes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::models::Address;
use crate::storage::{SubscriptionKind, SubscriptionStore};

/// Serialized store layout. Subscriber sets and hashes are keyed by
/// `"{kind}:{addr_id}"`, address books by user id.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    subscribers: BTreeMap<String, BTreeSet<i64>>,
    #[serde(default)]
    hashes: BTreeMap<String, String>,
    #[serde(default)]
    addresses: BTreeMap<i64, Vec<Address>>,
}

/// File-backed subscription store.
pub struct LocalStore {
    path: PathBuf,
    state: RwLock<StoreData>,
}

impl LocalStore {
    /// Open a store, loading existing data if the file is present.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => return Err(AppError::Io(e)),
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn key(kind: SubscriptionKind, addr_id: &str) -> String {
        format!("{kind}:{addr_id}")
    }

    /// Write the store atomically: temp file first, then rename.
    async fn persist(&self, state: &StoreData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for LocalStore {
    async fn add_subscription(
        &self,
        user_id: i64,
        addr_id: &str,
        kind: SubscriptionKind,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .subscribers
            .entry(Self::key(kind, addr_id))
            .or_default()
            .insert(user_id);
        self.persist(&state).await
    }

    async fn remove_subscription(
        &self,
        user_id: i64,
        addr_id: &str,
        kind: SubscriptionKind,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let key = Self::key(kind, addr_id);
        if let Some(users) = state.subscribers.get_mut(&key) {
            users.remove(&user_id);
            if users.is_empty() {
                state.subscribers.remove(&key);
            }
        }
        self.persist(&state).await
    }

    async fn get_subscribers(
        &self,
        addr_id: &str,
        kind: SubscriptionKind,
    ) -> Result<BTreeSet<i64>> {
        let state = self.state.read().await;
        Ok(state
            .subscribers
            .get(&Self::key(kind, addr_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_all_addresses(&self) -> Result<BTreeSet<String>> {
        let state = self.state.read().await;
        Ok(state
            .subscribers
            .iter()
            .filter(|(_, users)| !users.is_empty())
            .filter_map(|(key, _)| key.split_once(':').map(|(_, addr)| addr.to_string()))
            .collect())
    }

    async fn get_last_hash(
        &self,
        addr_id: &str,
        kind: SubscriptionKind,
    ) -> Result<Option<String>> {
        let state = self.state.read().await;
        Ok(state.hashes.get(&Self::key(kind, addr_id)).cloned())
    }

    async fn set_last_hash(
        &self,
        addr_id: &str,
        kind: SubscriptionKind,
        value: &str,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .hashes
            .insert(Self::key(kind, addr_id), value.to_string());
        self.persist(&state).await
    }

    async fn add_address(&self, user_id: i64, address: &Address) -> Result<()> {
        let mut state = self.state.write().await;
        let book = state.addresses.entry(user_id).or_default();
        book.retain(|a| a.id() != address.id());
        book.push(address.clone());
        self.persist(&state).await
    }

    async fn remove_address(&self, user_id: i64, addr_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(book) = state.addresses.get_mut(&user_id) {
            book.retain(|a| a.id() != addr_id);
        }
        self.persist(&state).await
    }

    async fn get_address_by_id(&self, user_id: i64, addr_id: &str) -> Result<Option<Address>> {
        let state = self.state.read().await;
        Ok(state
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
    use tempfile::TempDir;

    fn sample_address() -> Address {
        Address {
            city: LookupItem {
                id: 510100000,
                name: "Вінниця (Вінницький район)".to_string(),
            },
            street: LookupItem {
                id: 1444,
                name: "вул. Соборна".to_string(),
            },
            house: LookupItem {
                id: 32599,
                name: "15".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("subscriptions.json");

        {
            let store = LocalStore::open(&path).await.unwrap();
            store
                .add_subscription(42, "1-2-3", SubscriptionKind::Today)
                .await
                .unwrap();
            store
                .set_last_hash("1-2-3", SubscriptionKind::Tomorrow, "deadbeef")
                .await
                .unwrap();
            store.add_address(42, &sample_address()).await.unwrap();
        }

        let store = LocalStore::open(&path).await.unwrap();
        let subs = store
            .get_subscribers("1-2-3", SubscriptionKind::Today)
            .await
            .unwrap();
        assert!(subs.contains(&42));
        assert_eq!(
            store
                .get_last_hash("1-2-3", SubscriptionKind::Tomorrow)
                .await
                .unwrap()
                .as_deref(),
            Some("deadbeef")
        );
        assert!(
            store
                .get_address_by_id(42, "510100000-1444-32599")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path().join("nope.json")).await.unwrap();
        assert!(store.get_all_addresses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribed_addresses_disappear() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path().join("subs.json")).await.unwrap();

        store
            .add_subscription(1, "1-2-3", SubscriptionKind::Today)
            .await
            .unwrap();
        store
            .remove_subscription(1, "1-2-3", SubscriptionKind::Today)
            .await
            .unwrap();

        assert!(store.get_all_addresses().await.unwrap().is_empty());
    }
}
