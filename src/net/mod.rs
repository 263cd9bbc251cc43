//! Network fetch collaborator.
//!
//! The synchronizer never talks HTTP directly; it goes through the
//! [`Fetcher`] trait so hosts (and tests) can substitute their own
//! transport. [`HttpFetcher`] is the stock reqwest implementation.
//!
//! Non-2xx responses are values, not errors: the fetch handler returns
//! them to the caller uncached. [`FetchError`] covers transport
//! failures only.

pub mod client;
pub mod error;

pub use client::{FetchedResponse, Fetcher, HttpFetcher};
pub use error::FetchError;
