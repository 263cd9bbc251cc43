//! Synchronizer configuration.
//!
//! Carries the origin the synchronizer serves and the names of its
//! three stores. Store names are stable identifiers: the manifest diff
//! on upgrade only works when consecutive deployments use the same
//! names.
//!
//! Configuration round-trips as JSON; files may specify just the
//! origin and inherit defaults for everything else.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for the default on-disk store root
const APP_NAME: &str = "shellcache";

/// Default temporary staging store name
const DEFAULT_TEMP_STORE: &str = "app-temp-cache";

/// Default long-lived content store name
const DEFAULT_CONTENT_STORE: &str = "app-content-cache";

/// Default store name for the applied manifest
const DEFAULT_MANIFEST_STORE: &str = "app-manifest";

/// Maximum concurrent downloads during a bulk prefetch.
/// Limits parallel requests to avoid overwhelming the server.
const DEFAULT_PREFETCH_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Origin served by this synchronizer, without a trailing slash
    /// (e.g. `https://app.example.com`).
    pub origin: String,

    #[serde(default = "default_temp_store")]
    pub temp_store: String,

    #[serde(default = "default_content_store")]
    pub content_store: String,

    #[serde(default = "default_manifest_store")]
    pub manifest_store: String,

    #[serde(default = "default_prefetch_concurrency")]
    pub prefetch_concurrency: usize,
}

fn default_temp_store() -> String {
    DEFAULT_TEMP_STORE.to_string()
}

fn default_content_store() -> String {
    DEFAULT_CONTENT_STORE.to_string()
}

fn default_manifest_store() -> String {
    DEFAULT_MANIFEST_STORE.to_string()
}

fn default_prefetch_concurrency() -> usize {
    DEFAULT_PREFETCH_CONCURRENCY
}

impl SyncConfig {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            temp_store: default_temp_store(),
            content_store: default_content_store(),
            manifest_store: default_manifest_store(),
            prefetch_concurrency: default_prefetch_concurrency(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.origin = config.origin.trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Default root directory for [`crate::store::DiskStores`].
    pub fn default_store_root() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = SyncConfig::new("https://app.example.com/");
        assert_eq!(config.origin, "https://app.example.com");
        assert_eq!(config.temp_store, DEFAULT_TEMP_STORE);
        assert_eq!(config.content_store, DEFAULT_CONTENT_STORE);
        assert_eq!(config.manifest_store, DEFAULT_MANIFEST_STORE);
        assert_eq!(config.prefetch_concurrency, DEFAULT_PREFETCH_CONCURRENCY);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = SyncConfig::new("https://app.example.com");
        config.content_store = "my-content".to_string();
        config.save(&path).unwrap();

        let loaded = SyncConfig::load(&path).unwrap();
        assert_eq!(loaded.origin, "https://app.example.com");
        assert_eq!(loaded.content_store, "my-content");
    }

    #[test]
    fn test_load_fills_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"origin": "https://app.example.com/"}"#).unwrap();

        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config.origin, "https://app.example.com");
        assert_eq!(config.temp_store, DEFAULT_TEMP_STORE);
        assert_eq!(config.prefetch_concurrency, DEFAULT_PREFETCH_CONCURRENCY);
    }
}
