//! Cache entries and the result type handed back to callers.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::client::FetchError;

/// A decoded response, shared between the cache and every reader.
///
/// The concrete type is fixed by the endpoint that produced it; endpoint
/// names are unique, so a key always holds the same payload type.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
  /// A fetch is in flight
  Pending,
  /// The last fetch succeeded
  Fulfilled,
  /// The last fetch failed
  Failed,
}

/// One cached result.
///
/// `data` is the last value any fetch for this key produced. It survives
/// refetches and failed fetches so the UI can keep showing it; it is `None`
/// only until the first successful fetch.
#[derive(Clone)]
pub struct CacheEntry {
  pub status: EntryStatus,
  pub data: Option<Payload>,
  pub error: Option<FetchError>,
  /// When `data` was fetched
  pub fetched_at: Option<DateTime<Utc>>,
  /// Set by tag invalidation or a failed refetch; cleared by a successful fetch
  pub stale: bool,
}

impl CacheEntry {
  /// Entry for a fetch that just started, keeping whatever was known before.
  pub fn pending(previous: Option<&CacheEntry>) -> Self {
    match previous {
      Some(prev) => Self {
        status: EntryStatus::Pending,
        data: prev.data.clone(),
        error: None,
        fetched_at: prev.fetched_at,
        stale: prev.stale,
      },
      None => Self {
        status: EntryStatus::Pending,
        data: None,
        error: None,
        fetched_at: None,
        stale: false,
      },
    }
  }

  pub fn fulfilled(data: Payload) -> Self {
    Self {
      status: EntryStatus::Fulfilled,
      data: Some(data),
      error: None,
      fetched_at: Some(Utc::now()),
      stale: false,
    }
  }

  /// Entry for a failed fetch. Prior data is kept but flagged stale.
  pub fn failed(previous: Option<&CacheEntry>, error: FetchError) -> Self {
    Self {
      status: EntryStatus::Failed,
      data: previous.and_then(|prev| prev.data.clone()),
      error: Some(error),
      fetched_at: previous.and_then(|prev| prev.fetched_at),
      stale: true,
    }
  }

  /// Typed view of the cached data.
  pub fn data<R: Any + Send + Sync>(&self) -> Option<Arc<R>> {
    self.data.clone()?.downcast::<R>().ok()
  }
}

impl fmt::Debug for CacheEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheEntry")
      .field("status", &self.status)
      .field("has_data", &self.data.is_some())
      .field("error", &self.error)
      .field("fetched_at", &self.fetched_at)
      .field("stale", &self.stale)
      .finish()
  }
}

/// Result from a cache-first query, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: Arc<T>,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: Arc<T>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: Arc<T>, cached_at: Option<DateTime<Utc>>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      cached_at,
    }
  }

  pub fn is_stale(&self) -> bool {
    self.source == CacheSource::CacheStale
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched (or joined an in-flight fetch) for this call
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache, stale; a background refetch has been started
  CacheStale,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pending_keeps_previous_data() {
    let done = CacheEntry::fulfilled(Arc::new(5u32));
    let pending = CacheEntry::pending(Some(&done));
    assert_eq!(pending.status, EntryStatus::Pending);
    assert_eq!(pending.data::<u32>().as_deref(), Some(&5));
    assert_eq!(pending.fetched_at, done.fetched_at);
    assert!(!pending.stale);
  }

  #[test]
  fn test_failed_keeps_data_and_marks_stale() {
    let done = CacheEntry::fulfilled(Arc::new("last good".to_string()));
    let failed = CacheEntry::failed(Some(&done), FetchError::HttpStatus { code: 503 });
    assert_eq!(failed.status, EntryStatus::Failed);
    assert_eq!(
      failed.data::<String>().as_deref().map(String::as_str),
      Some("last good")
    );
    assert_eq!(failed.error, Some(FetchError::HttpStatus { code: 503 }));
    assert!(failed.stale);
  }

  #[test]
  fn test_failed_without_history_has_no_data() {
    let failed = CacheEntry::failed(None, FetchError::Network("refused".into()));
    assert!(failed.data.is_none());
    assert!(failed.fetched_at.is_none());
  }

  #[test]
  fn test_typed_view_rejects_wrong_type() {
    let done = CacheEntry::fulfilled(Arc::new(5u32));
    assert!(done.data::<String>().is_none());
  }
}
