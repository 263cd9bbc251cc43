//! Shellcache - an offline app-shell cache synchronizer.
//!
//! This crate keeps a named persistent resource cache in sync with a
//! build-time resource manifest (resource path -> content fingerprint)
//! and answers intercepted GET requests from that cache. The host
//! platform delivers lifecycle events (install, activate, fetch,
//! control message) to a [`worker::Synchronizer`], which owns all
//! cache-synchronization semantics:
//!
//! - install stages the core app shell into a temporary store
//! - activate diffs the new manifest against the previously applied
//!   one, evicts stale entries, and merges the staged shell
//! - fetch serves manifest resources cache-first (online-first for the
//!   root document)
//! - control messages trigger skip-waiting or a bulk offline prefetch
//!
//! Stores and the network client are trait seams ([`store::StoreHub`],
//! [`net::Fetcher`]) so hosts can plug in their own persistence and
//! transport.

pub mod config;
pub mod host;
pub mod manifest;
pub mod net;
pub mod store;
pub mod worker;

pub use config::SyncConfig;
pub use host::{HostHandle, NullHost};
pub use manifest::{ResourceManifest, ROOT_KEY};
pub use net::{FetchError, FetchedResponse, Fetcher, HttpFetcher};
pub use store::{CacheStore, DiskStores, MemoryStores, StoreHub, StoredResponse};
pub use worker::{
    ControlMessage, EventOutcome, FetchOutcome, ResourceRequest, Synchronizer, WorkerEvent,
};
