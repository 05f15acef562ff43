//! In-memory cache store with tag bindings and per-key change notifications.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

use super::entry::{CacheEntry, Payload};
use super::key::CacheKey;
use super::tags::{Tag, TagIndex};

#[derive(Default)]
struct State {
  entries: HashMap<CacheKey, CacheEntry>,
  tags: TagIndex,
  /// Version counters; subscribers hold the receiving ends
  channels: HashMap<CacheKey, watch::Sender<u64>>,
}

impl State {
  fn notify(&self, key: &CacheKey) {
    if let Some(tx) = self.channels.get(key) {
      tx.send_modify(|version| *version += 1);
    }
  }
}

/// Process-scoped cache of query results.
///
/// Starts empty. Entries and the tag index share one lock, so every
/// operation (including a write plus its tag rebinding) is atomic with
/// respect to readers of the same key.
#[derive(Default)]
pub struct CacheStore {
  state: Mutex<State>,
}

impl CacheStore {
  pub fn new() -> Self {
    Self::default()
  }

  // Critical sections never panic midway, so a poisoned lock still guards
  // consistent state.
  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
    self.lock().entries.get(key).cloned()
  }

  /// Replace the entry for `key` with one derived from the current entry.
  pub fn update(
    &self,
    key: &CacheKey,
    f: impl FnOnce(Option<&CacheEntry>) -> CacheEntry,
  ) -> CacheEntry {
    let mut state = self.lock();
    let next = f(state.entries.get(key));
    state.entries.insert(key.clone(), next.clone());
    state.notify(key);
    next
  }

  /// Store a successful result and replace the key's tag bindings.
  pub fn fulfill(&self, key: &CacheKey, data: Payload, tags: Vec<Tag>) {
    let mut state = self.lock();
    state.entries.insert(key.clone(), CacheEntry::fulfilled(data));
    state.tags.rebind(key, tags);
    state.notify(key);
  }

  /// Flag the entry stale without touching its data. Returns false if absent.
  pub fn mark_stale(&self, key: &CacheKey) -> bool {
    let mut state = self.lock();
    let Some(entry) = state.entries.get_mut(key) else {
      return false;
    };
    entry.stale = true;
    state.notify(key);
    true
  }

  /// Resolve `tags` and mark every bound entry stale in one step.
  ///
  /// Returns the affected keys, deduplicated.
  pub fn invalidate(&self, tags: &[Tag]) -> Vec<CacheKey> {
    let mut state = self.lock();
    let keys: Vec<CacheKey> = state.tags.resolve_all(tags).into_iter().collect();
    for key in &keys {
      if let Some(entry) = state.entries.get_mut(key) {
        entry.stale = true;
      }
      state.notify(key);
    }
    keys
  }

  /// Remove the entry and all of its tag bindings.
  pub fn evict(&self, key: &CacheKey) -> Option<CacheEntry> {
    let mut state = self.lock();
    state.tags.unbind_key(key);
    if state
      .channels
      .get(key)
      .is_some_and(|tx| tx.receiver_count() == 0)
    {
      state.channels.remove(key);
    }
    let removed = state.entries.remove(key);
    if removed.is_some() {
      debug!(%key, "evicted cache entry");
    }
    removed
  }

  #[cfg(test)]
  pub fn resolve(&self, tag: &Tag) -> std::collections::HashSet<CacheKey> {
    self.lock().tags.resolve(tag)
  }

  /// Receiver that observes a version bump on every change to `key`.
  pub fn watch(&self, key: &CacheKey) -> watch::Receiver<u64> {
    self
      .lock()
      .channels
      .entry(key.clone())
      .or_insert_with(|| watch::channel(0).0)
      .subscribe()
  }

  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }
}
