//! Subscriptions: consumer interest in a cache key, and garbage collection
//! of keys nobody is interested in.
//!
//! Per key: `unsubscribed(0) -> subscribed(n)` on subscribe, back to zero on
//! the last unsubscribe, then evicted once the retention window passes
//! without a resubscribe.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

use super::endpoint::{Args, EndpointKind, QueryEndpoint, Response};
use super::error::FetchError;
use super::ApiClient;
use crate::cache::{CacheKey, EntryStatus};

#[derive(Default)]
struct Slot {
  count: usize,
  /// Bumped whenever the slot changes hands, so outdated timers can tell
  generation: u64,
  retention: Option<AbortHandle>,
}

pub(crate) struct SubscriptionManager {
  slots: Mutex<HashMap<CacheKey, Slot>>,
  keep_unused: Duration,
}

impl SubscriptionManager {
  pub fn new(keep_unused: Duration) -> Self {
    Self {
      slots: Mutex::new(HashMap::new()),
      keep_unused,
    }
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn count(&self, key: &CacheKey) -> usize {
    self.lock().get(key).map_or(0, |slot| slot.count)
  }

  /// Add a subscriber, cancelling any pending eviction. True for the first one.
  fn acquire(&self, key: &CacheKey) -> bool {
    let mut slots = self.lock();
    let slot = slots.entry(key.clone()).or_default();
    if let Some(timer) = slot.retention.take() {
      timer.abort();
    }
    slot.generation += 1;
    slot.count += 1;
    slot.count == 1
  }

  /// Remove a subscriber. True when none are left.
  fn release(&self, key: &CacheKey) -> bool {
    let mut slots = self.lock();
    match slots.get_mut(key) {
      Some(slot) => {
        slot.count = slot.count.saturating_sub(1);
        slot.count == 0
      }
      None => false,
    }
  }

  /// Generation for a new retention timer, if the key is unused and has none.
  fn arm(&self, key: &CacheKey) -> Option<u64> {
    let mut slots = self.lock();
    let slot = slots.entry(key.clone()).or_default();
    if slot.count > 0 || slot.retention.is_some() {
      return None;
    }
    slot.generation += 1;
    Some(slot.generation)
  }

  fn set_timer(&self, key: &CacheKey, generation: u64, timer: AbortHandle) {
    let mut slots = self.lock();
    match slots.get_mut(key) {
      Some(slot) if slot.generation == generation => slot.retention = Some(timer),
      _ => timer.abort(),
    }
  }

  /// Drop the slot if it is still unused since `generation` was armed.
  ///
  /// Keys with a fetch in flight are kept; the fetch re-arms retention when
  /// it completes.
  fn take_for_eviction(
    &self,
    key: &CacheKey,
    generation: u64,
    in_flight: impl FnOnce() -> bool,
  ) -> bool {
    let mut slots = self.lock();
    let Some(slot) = slots.get_mut(key) else {
      return false;
    };
    if slot.count > 0 || slot.generation != generation {
      return false;
    }
    if in_flight() {
      slot.retention = None;
      return false;
    }
    slots.remove(key);
    true
  }
}

impl ApiClient {
  /// Register interest in `(endpoint, args)`.
  ///
  /// The first subscriber of a key triggers a fetch when the entry is absent
  /// or stale; otherwise the cached entry is reused as is. The returned handle
  /// unsubscribes when dropped.
  pub fn subscribe<A: Args, R: Response>(
    &self,
    endpoint: &QueryEndpoint<A, R>,
    args: &A,
  ) -> Result<Subscription<R>, FetchError> {
    self.check_registered(endpoint.name(), EndpointKind::Query)?;
    let key = endpoint.key(args)?;
    self.remember(&key, endpoint, args);

    let first = self.inner.subscriptions.acquire(&key);
    let changes = self.inner.store.watch(&key);
    let needs_fetch = match self.inner.store.get(&key) {
      None => true,
      Some(entry) => first && entry.stale,
    };
    debug!(%key, first, needs_fetch, "subscribed");
    if needs_fetch {
      let _ = self.begin(&key, *endpoint, args);
    }

    Ok(Subscription {
      client: self.clone(),
      key,
      changes,
      _marker: PhantomData,
    })
  }

  fn release(&self, key: &CacheKey) {
    if self.inner.subscriptions.release(key) {
      debug!(%key, "last subscriber left");
      self.retain_if_unused(key);
    }
  }

  /// Start the retention window for `key` if it has no subscribers.
  pub(crate) fn retain_if_unused(&self, key: &CacheKey) {
    let Some(generation) = self.inner.subscriptions.arm(key) else {
      return;
    };
    let keep_unused = self.inner.subscriptions.keep_unused;

    match tokio::runtime::Handle::try_current() {
      Ok(runtime) => {
        let client = Arc::downgrade(&self.inner);
        let timer_key = key.clone();
        let timer = runtime.spawn(async move {
          tokio::time::sleep(keep_unused).await;
          if let Some(inner) = client.upgrade() {
            ApiClient { inner }.evict_if_unused(&timer_key, generation);
          }
        });
        self
          .inner
          .subscriptions
          .set_timer(key, generation, timer.abort_handle());
      }
      // Outside a runtime (e.g. during shutdown) there is nothing to wait on
      Err(_) => self.evict_if_unused(key, generation),
    }
  }

  fn evict_if_unused(&self, key: &CacheKey, generation: u64) {
    let executor = &self.inner.executor;
    if !self
      .inner
      .subscriptions
      .take_for_eviction(key, generation, || executor.is_in_flight(key))
    {
      return;
    }
    self.inner.store.evict(key);
    self.inner.executor.forget(key);
  }
}

/// Point-in-time view of a subscribed key.
#[derive(Debug)]
pub struct QuerySnapshot<R> {
  /// Last known data, possibly stale
  pub data: Option<Arc<R>>,
  /// `None` until the first fetch for the key starts
  pub status: Option<EntryStatus>,
  pub error: Option<FetchError>,
  pub stale: bool,
  pub fetched_at: Option<DateTime<Utc>>,
}

impl<R> QuerySnapshot<R> {
  /// Nothing to show yet and no error to report.
  pub fn is_loading(&self) -> bool {
    self.data.is_none() && matches!(self.status, None | Some(EntryStatus::Pending))
  }

  /// A request for this key is on the wire.
  pub fn is_fetching(&self) -> bool {
    self.status == Some(EntryStatus::Pending)
  }
}

impl<R> Clone for QuerySnapshot<R> {
  fn clone(&self) -> Self {
    Self {
      data: self.data.clone(),
      status: self.status,
      error: self.error.clone(),
      stale: self.stale,
      fetched_at: self.fetched_at,
    }
  }
}

/// A consumer's registered interest in one cache key.
///
/// Dropping the handle releases it. A fetch still in flight at that point
/// completes and fills the cache, but this handle observes nothing further.
pub struct Subscription<R> {
  client: ApiClient,
  key: CacheKey,
  changes: watch::Receiver<u64>,
  _marker: PhantomData<fn() -> R>,
}

impl<R: Response> Subscription<R> {
  pub fn snapshot(&self) -> QuerySnapshot<R> {
    match self.client.entry(&self.key) {
      Some(entry) => QuerySnapshot {
        data: entry.data::<R>(),
        status: Some(entry.status),
        error: entry.error.clone(),
        stale: entry.stale,
        fetched_at: entry.fetched_at,
      },
      None => QuerySnapshot {
        data: None,
        status: None,
        error: None,
        stale: false,
        fetched_at: None,
      },
    }
  }

  /// Whether the entry changed since the last [`Subscription::mark_seen`].
  pub fn has_changed(&self) -> bool {
    self.changes.has_changed().unwrap_or(false)
  }

  pub fn mark_seen(&mut self) {
    self.changes.borrow_and_update();
  }

  /// Fetch again regardless of freshness (joins a fetch already running).
  pub fn refetch(&self) {
    self.client.refetch_key(&self.key);
  }
}

impl<R> Drop for Subscription<R> {
  fn drop(&mut self) {
    self.client.release(&self.key);
  }
}

impl<R> std::fmt::Debug for Subscription<R> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("key", &self.key)
      .finish_non_exhaustive()
  }
}
