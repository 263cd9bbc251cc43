//! The cache synchronizer: event model, dispatch, and the four
//! lifecycle handlers.
//!
//! Event flow across a deployment:
//!
//! - install: download every core-shell resource fresh into the temp
//!   store (any failure aborts install)
//! - activate: diff the new manifest against the previously applied
//!   one, evict stale content entries, overlay the staged shell,
//!   persist the manifest, claim clients; any failure resets all
//!   three stores so the next activation starts clean
//! - fetch: serve manifest resources from the content store
//!   (online-first for the root document, cache-first with lazy
//!   population for everything else)
//! - message: skip-waiting signal, or a bulk prefetch of every
//!   manifest resource not yet cached
//!
//! Handlers take explicit store handles from the hub on each event;
//! there is no ambient global state.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::host::HostHandle;
use crate::manifest::{self, ResourceManifest, ROOT_KEY};
use crate::net::Fetcher;
use crate::store::{CacheStore, StoreHub, StoredResponse};

/// Entry key under which the applied manifest is persisted in the
/// manifest store.
const MANIFEST_ENTRY_KEY: &str = "manifest";

/// Control messages the host may deliver to a synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Activate a waiting instance immediately. The page reload that
    /// usually follows is the caller's responsibility.
    SkipWaiting,
    /// Download every manifest resource not yet in the content store.
    PrefetchAll,
}

/// An intercepted resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub method: String,
    pub url: String,
}

impl ResourceRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
        }
    }
}

/// The closed set of triggers a host delivers to the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(ResourceRequest),
    Message(ControlMessage),
}

/// Outcome of an intercepted fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not a manifest resource; the host's default network handling
    /// applies.
    PassThrough,
    /// Serve this response to the caller.
    Respond(StoredResponse),
}

/// Outcome of a dispatched event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Completed,
    Fetch(FetchOutcome),
}

/// Keeps the content store in sync with the deployed resource
/// manifest and answers intercepted requests from it.
pub struct Synchronizer<H, F, C> {
    stores: H,
    fetcher: F,
    host: C,
    config: SyncConfig,
    manifest: ResourceManifest,
    shell: Vec<String>,
    /// Serializes activations; a concurrent second activation would
    /// race on content-store deletion and recreation.
    activation: Mutex<()>,
}

impl<H, F, C> Synchronizer<H, F, C>
where
    H: StoreHub,
    F: Fetcher,
    C: HostHandle,
{
    pub fn new(
        config: SyncConfig,
        manifest: ResourceManifest,
        shell: Vec<String>,
        stores: H,
        fetcher: F,
        host: C,
    ) -> Self {
        Self {
            stores,
            fetcher,
            host,
            config,
            manifest,
            shell,
            activation: Mutex::new(()),
        }
    }

    pub fn manifest(&self) -> &ResourceManifest {
        &self.manifest
    }

    /// Route an event to its handler.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome> {
        match event {
            WorkerEvent::Install => self.on_install().await.map(|_| EventOutcome::Completed),
            WorkerEvent::Activate => self.on_activate().await.map(|_| EventOutcome::Completed),
            WorkerEvent::Fetch(request) => self.on_fetch(&request).await.map(EventOutcome::Fetch),
            WorkerEvent::Message(message) => {
                self.on_message(message).await.map(|_| EventOutcome::Completed)
            }
        }
    }

    /// Stage the core app shell into the temp store.
    ///
    /// Shell downloads bypass intermediary HTTP caches and must all
    /// report success; the first failure aborts install and the host
    /// retries on its own schedule.
    pub async fn on_install(&self) -> Result<()> {
        self.host.skip_waiting();

        let temp = self.stores.open(&self.config.temp_store).await?;
        for path in &self.shell {
            let url = manifest::request_url(&self.config.origin, path);
            let response = self
                .fetcher
                .get_fresh(&url)
                .await
                .with_context(|| format!("failed to download shell resource {}", path))?
                .ensure_ok(&url)?;
            temp.put(&url, StoredResponse::new(response.status, response.body))
                .await?;
        }

        info!(resources = self.shell.len(), "install complete, shell staged");
        Ok(())
    }

    /// Bring the content store in line with the current manifest and
    /// merge the staged shell.
    ///
    /// On any failure all three stores are deleted unconditionally and
    /// the original error is returned; the next activation then takes
    /// the fresh-install path. No partial-state recovery is attempted.
    pub async fn on_activate(&self) -> Result<()> {
        let _guard = self.activation.lock().await;

        if let Err(err) = self.try_activate().await {
            error!(error = %err, "activation failed, resetting all stores");
            self.reset_stores().await;
            return Err(err);
        }
        Ok(())
    }

    async fn try_activate(&self) -> Result<()> {
        let temp = self.stores.open(&self.config.temp_store).await?;
        let manifest_store = self.stores.open(&self.config.manifest_store).await?;

        let previous = match manifest_store.get(MANIFEST_ENTRY_KEY).await? {
            Some(entry) => Some(
                serde_json::from_slice::<ResourceManifest>(&entry.body)
                    .context("failed to parse persisted manifest")?,
            ),
            None => None,
        };

        let content = match previous {
            None => {
                // Fresh install, or recovering from a prior reset:
                // clear the entire content store.
                debug!("no prior manifest, rebuilding content store");
                self.stores.delete(&self.config.content_store).await?;
                self.stores.open(&self.config.content_store).await?
            }
            Some(old) => {
                let content = self.stores.open(&self.config.content_store).await?;
                self.evict_stale(&content, &old).await?;
                content
            }
        };

        // Overlay the staged shell, overwriting any retained entries
        // with the freshly fetched files.
        for url in temp.keys().await? {
            if let Some(entry) = temp.get(&url).await? {
                content.put(&url, entry).await?;
            }
        }
        self.stores.delete(&self.config.temp_store).await?;

        let body =
            serde_json::to_vec(&self.manifest).context("failed to serialize manifest")?;
        manifest_store
            .put(MANIFEST_ENTRY_KEY, StoredResponse::new(200, body))
            .await?;

        self.host.claim_clients().await?;
        info!(resources = self.manifest.len(), "activation complete");
        Ok(())
    }

    /// Diff-and-evict pass: fingerprint equality between the old and
    /// new manifest is the sole staleness signal.
    async fn evict_stale(&self, content: &H::Store, old: &ResourceManifest) -> Result<()> {
        for url in content.keys().await? {
            let Some(key) = manifest::request_key(&self.config.origin, &url) else {
                warn!(url = %url, "evicting entry outside configured origin");
                content.delete(&url).await?;
                continue;
            };
            let stale = match self.manifest.fingerprint(&key) {
                None => true,
                Some(current) => old.fingerprint(&key) != Some(current),
            };
            if stale {
                debug!(key = %key, "evicting stale entry");
                content.delete(&url).await?;
            }
        }
        Ok(())
    }

    async fn reset_stores(&self) {
        for name in [
            &self.config.content_store,
            &self.config.temp_store,
            &self.config.manifest_store,
        ] {
            if let Err(err) = self.stores.delete(name).await {
                warn!(store = %name, error = %err, "failed to delete store during reset");
            }
        }
    }

    /// Answer an intercepted request, or decline it.
    ///
    /// Stateless across requests. Lookups and population use the
    /// normalized URL, so `?v=` cache-busting variants share one
    /// entry.
    pub async fn on_fetch(&self, request: &ResourceRequest) -> Result<FetchOutcome> {
        if request.method != "GET" {
            return Ok(FetchOutcome::PassThrough);
        }
        let Some(key) = manifest::request_key(&self.config.origin, &request.url) else {
            return Ok(FetchOutcome::PassThrough);
        };
        if !self.manifest.contains(&key) {
            return Ok(FetchOutcome::PassThrough);
        }

        let content = self.stores.open(&self.config.content_store).await?;
        let url = manifest::request_url(&self.config.origin, &key);
        if key == ROOT_KEY {
            self.online_first(&content, &url).await
        } else {
            self.cache_first(&content, &url).await
        }
    }

    /// Root-document policy: prefer the live network, fall back to the
    /// cache, re-raise the network failure when nothing is cached.
    async fn online_first(&self, content: &H::Store, url: &str) -> Result<FetchOutcome> {
        match self.fetcher.get(url).await {
            Ok(response) => {
                let stored = StoredResponse::new(response.status, response.body);
                content.put(url, stored.clone()).await?;
                Ok(FetchOutcome::Respond(stored))
            }
            Err(err) => match content.get(url).await? {
                Some(cached) => {
                    debug!(url = %url, error = %err, "network failed, serving cached root");
                    Ok(FetchOutcome::Respond(cached))
                }
                None => {
                    Err(err).context("online-first fetch failed with no cached fallback")
                }
            },
        }
    }

    /// Default resource policy: serve the cached entry, otherwise
    /// fetch and lazily populate the cache on a success status.
    async fn cache_first(&self, content: &H::Store, url: &str) -> Result<FetchOutcome> {
        if let Some(cached) = content.get(url).await? {
            return Ok(FetchOutcome::Respond(cached));
        }

        let response = self
            .fetcher
            .get(url)
            .await
            .with_context(|| format!("failed to fetch {}", url))?;
        let stored = StoredResponse::new(response.status, response.body);
        if stored.is_ok() {
            content.put(url, stored.clone()).await?;
        }
        Ok(FetchOutcome::Respond(stored))
    }

    /// Handle a control message from the host.
    pub async fn on_message(&self, message: ControlMessage) -> Result<()> {
        match message {
            ControlMessage::SkipWaiting => {
                self.host.skip_waiting();
                Ok(())
            }
            ControlMessage::PrefetchAll => self.prefetch_missing().await,
        }
    }

    /// Download every manifest resource the content store is missing.
    ///
    /// Everything is fetched up front with bounded concurrency and
    /// persisted only on full success, so a single failed download
    /// leaves the store untouched.
    async fn prefetch_missing(&self) -> Result<()> {
        let content = self.stores.open(&self.config.content_store).await?;

        let cached: BTreeSet<String> = content
            .keys()
            .await?
            .iter()
            .filter_map(|url| manifest::request_key(&self.config.origin, url))
            .collect();
        let missing: Vec<&str> = self
            .manifest
            .keys()
            .filter(|key| !cached.contains(*key))
            .collect();
        if missing.is_empty() {
            debug!("prefetch: content store already complete");
            return Ok(());
        }
        info!(count = missing.len(), "prefetching missing resources");

        let origin = self.config.origin.as_str();
        let fetcher = &self.fetcher;
        let fetched: Vec<(String, StoredResponse)> = stream::iter(missing)
            .map(|key| {
                let url = manifest::request_url(origin, key);
                async move {
                    let response = fetcher
                        .get(&url)
                        .await
                        .with_context(|| format!("prefetch failed for {}", key))?
                        .ensure_ok(&url)?;
                    Ok::<_, anyhow::Error>((
                        url,
                        StoredResponse::new(response.status, response.body),
                    ))
                }
            })
            .buffer_unordered(self.config.prefetch_concurrency.max(1))
            .try_collect()
            .await?;

        for (url, entry) in fetched {
            content.put(&url, entry).await?;
        }
        Ok(())
    }
}
