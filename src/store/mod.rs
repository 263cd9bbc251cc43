//! Named response stores for offline resource caching.
//!
//! A synchronizer works against three named stores (temp staging,
//! content, applied manifest) through the [`StoreHub`] / [`CacheStore`]
//! traits. Two implementations ship with the crate:
//!
//! - [`MemoryStores`]: shared in-memory maps, used in tests and by
//!   hosts that manage their own persistence
//! - [`DiskStores`]: one JSON file per named store under a root
//!   directory

pub mod disk;
pub mod memory;

pub use disk::DiskStores;
pub use memory::MemoryStores;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached response body with its HTTP status.
///
/// `stored_at` is informational (cache inspection, debugging); it is
/// never consulted as a staleness signal. Staleness between
/// deployments is decided purely by manifest fingerprint comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl StoredResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            body,
            stored_at: Utc::now(),
        }
    }

    /// Whether the response reported a 2xx success status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single named key-value store of cached responses.
#[allow(async_fn_in_trait)]
pub trait CacheStore {
    async fn get(&self, key: &str) -> Result<Option<StoredResponse>>;

    async fn put(&self, key: &str, response: StoredResponse) -> Result<()>;

    /// Delete an entry; returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All entry keys currently in the store.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Open-or-create and drop whole named stores.
#[allow(async_fn_in_trait)]
pub trait StoreHub {
    type Store: CacheStore;

    /// Open a named store, creating it when absent.
    async fn open(&self, name: &str) -> Result<Self::Store>;

    /// Drop an entire named store; returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_response_is_ok() {
        assert!(StoredResponse::new(200, vec![]).is_ok());
        assert!(StoredResponse::new(204, vec![]).is_ok());
        assert!(!StoredResponse::new(304, vec![]).is_ok());
        assert!(!StoredResponse::new(404, vec![]).is_ok());
        assert!(!StoredResponse::new(500, vec![]).is_ok());
    }
}
