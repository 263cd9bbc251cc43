//! Disk-backed store hub.
//!
//! Each named store is a single pretty-printed JSON file
//! `<root>/<name>.json` holding the full key -> entry map, read and
//! rewritten per operation. Stores here are small (an app shell plus
//! lazily cached resources), so whole-file rewrites keep the format
//! trivially inspectable without an index.
//!
//! Concurrent writers to the same store file are not coordinated; the
//! synchronizer's event model is single-threaded per store.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{CacheStore, StoreHub, StoredResponse};

/// Disk-backed named stores rooted at a directory.
#[derive(Debug, Clone)]
pub struct DiskStores {
    root: PathBuf,
}

impl DiskStores {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create store root {}", root.display()))?;
        Ok(Self { root })
    }

    /// Default store root under the platform cache directory,
    /// namespaced by application name.
    pub fn default_root(app_name: &str) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(app_name))
    }

    fn store_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }

    /// Names of all currently existing stores, in sorted order.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("failed to read store root {}", self.root.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Handle to one named on-disk store.
#[derive(Debug, Clone)]
pub struct DiskStore {
    path: PathBuf,
}

impl DiskStore {
    fn load_map(&self) -> Result<BTreeMap<String, StoredResponse>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read store file {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse store file {}", self.path.display()))
    }

    fn save_map(&self, map: &BTreeMap<String, StoredResponse>) -> Result<()> {
        let contents = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("failed to write store file {}", self.path.display()))
    }
}

impl CacheStore for DiskStore {
    async fn get(&self, key: &str) -> Result<Option<StoredResponse>> {
        Ok(self.load_map()?.remove(key))
    }

    async fn put(&self, key: &str, response: StoredResponse) -> Result<()> {
        let mut map = self.load_map()?;
        map.insert(key.to_string(), response);
        self.save_map(&map)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut map = self.load_map()?;
        let existed = map.remove(key).is_some();
        if existed {
            self.save_map(&map)?;
        }
        Ok(existed)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.load_map()?.into_keys().collect())
    }
}

impl StoreHub for DiskStores {
    type Store = DiskStore;

    async fn open(&self, name: &str) -> Result<DiskStore> {
        // The file itself is created lazily on first write.
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create store root {}", self.root.display()))?;
        Ok(DiskStore {
            path: self.store_path(name),
        })
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let path = self.store_path(name);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("failed to delete store file {}", path.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let hub = DiskStores::new(dir.path().to_path_buf()).unwrap();
            let store = hub.open("content").await.unwrap();
            store
                .put("a", StoredResponse::new(200, b"alpha".to_vec()))
                .await
                .unwrap();
        }

        // A fresh hub over the same root sees the persisted entry.
        let hub = DiskStores::new(dir.path().to_path_buf()).unwrap();
        let store = hub.open("content").await.unwrap();
        let cached = store.get("a").await.unwrap().unwrap();
        assert_eq!(cached.status, 200);
        assert_eq!(cached.body, b"alpha");
        assert_eq!(store.keys().await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_delete_entry_and_store() {
        let dir = tempfile::tempdir().unwrap();
        let hub = DiskStores::new(dir.path().to_path_buf()).unwrap();
        let store = hub.open("temp").await.unwrap();
        store
            .put("a", StoredResponse::new(200, vec![1]))
            .await
            .unwrap();
        assert_eq!(hub.names().unwrap(), vec!["temp"]);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());

        assert!(hub.delete("temp").await.unwrap());
        assert!(!hub.delete("temp").await.unwrap());
        assert!(hub.names().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let hub = DiskStores::new(dir.path().to_path_buf()).unwrap();
        let store = hub.open("content").await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
        assert!(hub.names().unwrap().is_empty());
    }
}
