//! In-memory store hub backed by shared maps.
//!
//! Clones share the same underlying state, so a host can hand one
//! clone to the synchronizer and keep another for inspection.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;

use super::{CacheStore, StoreHub, StoredResponse};

type StoreMap = BTreeMap<String, StoredResponse>;

/// In-memory named stores. Clone is cheap - state is Arc-shared.
#[derive(Debug, Clone, Default)]
pub struct MemoryStores {
    inner: Arc<RwLock<BTreeMap<String, StoreMap>>>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all currently existing stores, in sorted order.
    pub async fn names(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }
}

/// Handle to one named in-memory store.
///
/// A handle stays valid across deletion of its store: reads then see
/// an empty store and the next write recreates it, matching the
/// open-or-create contract.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    name: String,
    inner: Arc<RwLock<BTreeMap<String, StoreMap>>>,
}

impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredResponse>> {
        let stores = self.inner.read().await;
        Ok(stores.get(&self.name).and_then(|map| map.get(key)).cloned())
    }

    async fn put(&self, key: &str, response: StoredResponse) -> Result<()> {
        let mut stores = self.inner.write().await;
        stores
            .entry(self.name.clone())
            .or_default()
            .insert(key.to_string(), response);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut stores = self.inner.write().await;
        Ok(stores
            .get_mut(&self.name)
            .is_some_and(|map| map.remove(key).is_some()))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let stores = self.inner.read().await;
        Ok(stores
            .get(&self.name)
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default())
    }
}

impl StoreHub for MemoryStores {
    type Store = MemoryStore;

    async fn open(&self, name: &str) -> Result<MemoryStore> {
        let mut stores = self.inner.write().await;
        stores.entry(name.to_string()).or_default();
        Ok(MemoryStore {
            name: name.to_string(),
            inner: Arc::clone(&self.inner),
        })
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut stores = self.inner.write().await;
        Ok(stores.remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete_keys() {
        let hub = MemoryStores::new();
        let store = hub.open("content").await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), None);
        store
            .put("a", StoredResponse::new(200, b"alpha".to_vec()))
            .await
            .unwrap();
        store
            .put("b", StoredResponse::new(200, b"beta".to_vec()))
            .await
            .unwrap();

        let cached = store.get("a").await.unwrap().unwrap();
        assert_eq!(cached.body, b"alpha");
        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.keys().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let hub = MemoryStores::new();
        let store = hub.open("content").await.unwrap();
        store
            .put("a", StoredResponse::new(200, b"old".to_vec()))
            .await
            .unwrap();
        store
            .put("a", StoredResponse::new(200, b"new".to_vec()))
            .await
            .unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap().body, b"new");
    }

    #[tokio::test]
    async fn test_delete_whole_store() {
        let hub = MemoryStores::new();
        let store = hub.open("temp").await.unwrap();
        store
            .put("a", StoredResponse::new(200, vec![1]))
            .await
            .unwrap();

        assert!(hub.delete("temp").await.unwrap());
        assert!(!hub.delete("temp").await.unwrap());
        assert!(hub.names().await.is_empty());

        // The surviving handle sees an empty store and recreates it on
        // the next write.
        assert_eq!(store.get("a").await.unwrap(), None);
        store
            .put("b", StoredResponse::new(200, vec![2]))
            .await
            .unwrap();
        assert_eq!(hub.names().await, vec!["temp"]);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let hub = MemoryStores::new();
        let other = hub.clone();
        let store = hub.open("content").await.unwrap();
        store
            .put("a", StoredResponse::new(200, vec![1]))
            .await
            .unwrap();

        let view = other.open("content").await.unwrap();
        assert!(view.get("a").await.unwrap().is_some());
    }
}
