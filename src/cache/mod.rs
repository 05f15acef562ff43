//! Normalized in-memory cache for remote query results.
//!
//! This module provides a transport-agnostic caching mechanism that:
//! - Keys results by endpoint name and canonically serialized arguments
//! - Tracks which results depend on which invalidation tags
//! - Keeps last-known data across refetches and failures, flagged stale
//! - Notifies interested subscribers of every change to a key

mod entry;
mod key;
mod store;
mod tags;

pub use entry::{CacheEntry, CacheResult, CacheSource, EntryStatus, Payload};
pub use key::CacheKey;
pub use store::CacheStore;
pub use tags::Tag;
