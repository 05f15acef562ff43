//! Single-flight fetch execution.
//!
//! Every fetch for a key runs as one `Shared` future registered under that
//! key; later callers clone and await it instead of starting another
//! request. A spawned task drives each fetch, so results land in the cache
//! even when every caller has stopped waiting.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::endpoint::{Args, QueryEndpoint, Response};
use super::error::FetchError;
use super::ApiClient;
use crate::cache::{CacheEntry, CacheKey, Payload};

pub(crate) type SharedFetch = Shared<BoxFuture<'static, Result<Payload, FetchError>>>;

/// Restarts the fetch for one key; captures the typed endpoint and arguments.
type Origin = Arc<dyn Fn(&ApiClient) + Send + Sync>;

#[derive(Default)]
struct State {
  fetches: HashMap<CacheKey, SharedFetch>,
  /// In-flight keys invalidated after their request went out
  dirty: HashSet<CacheKey>,
  origins: HashMap<CacheKey, Origin>,
}

#[derive(Default)]
pub(crate) struct Executor {
  state: Mutex<State>,
}

impl Executor {
  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn is_in_flight(&self, key: &CacheKey) -> bool {
    self.lock().fetches.contains_key(key)
  }

  pub fn in_flight_count(&self) -> usize {
    self.lock().fetches.len()
  }

  pub fn mark_dirty_if_in_flight(&self, key: &CacheKey) -> bool {
    let mut state = self.lock();
    if !state.fetches.contains_key(key) {
      return false;
    }
    state.dirty.insert(key.clone());
    true
  }

  /// Unregister a completed fetch. Returns whether it was invalidated mid-flight.
  fn finish(&self, key: &CacheKey) -> bool {
    let mut state = self.lock();
    state.fetches.remove(key);
    state.dirty.remove(key)
  }

  fn origin(&self, key: &CacheKey) -> Option<Origin> {
    self.lock().origins.get(key).cloned()
  }

  pub fn forget(&self, key: &CacheKey) {
    self.lock().origins.remove(key);
  }
}

impl ApiClient {
  /// Record how to refetch `key`, the first time it is seen.
  pub(crate) fn remember<A: Args, R: Response>(
    &self,
    key: &CacheKey,
    endpoint: &QueryEndpoint<A, R>,
    args: &A,
  ) {
    let mut state = self.inner.executor.lock();
    if state.origins.contains_key(key) {
      return;
    }
    let endpoint = *endpoint;
    let args = args.clone();
    let origin_key = key.clone();
    state.origins.insert(
      key.clone(),
      Arc::new(move |client: &ApiClient| {
        let _ = client.begin(&origin_key, endpoint, &args);
      }),
    );
  }

  /// Start a fetch for `key`, or join the one already running.
  pub(crate) fn begin<A: Args, R: Response>(
    &self,
    key: &CacheKey,
    endpoint: QueryEndpoint<A, R>,
    args: &A,
  ) -> SharedFetch {
    let mut state = self.inner.executor.lock();
    if let Some(running) = state.fetches.get(key) {
      debug!(%key, "joining in-flight fetch");
      return running.clone();
    }

    self.inner.store.update(key, CacheEntry::pending);
    let fetch = run_fetch(self.clone(), key.clone(), endpoint, args.clone())
      .boxed()
      .shared();
    state.fetches.insert(key.clone(), fetch.clone());
    drop(state);

    debug!(%key, "fetch started");
    tokio::spawn(fetch.clone());
    fetch
  }

  /// Start (or join) a fetch for a key seen before. No-op for unknown keys.
  pub(crate) fn refetch_key(&self, key: &CacheKey) {
    if let Some(origin) = self.inner.executor.origin(key) {
      origin(self);
    }
  }
}

async fn run_fetch<A: Args, R: Response>(
  client: ApiClient,
  key: CacheKey,
  endpoint: QueryEndpoint<A, R>,
  args: A,
) -> Result<Payload, FetchError> {
  let request = endpoint.request(&args);
  let outcome = client
    .inner
    .transport
    .send(request)
    .await
    .and_then(|body| decode::<R>(&body));

  let result = match outcome {
    Ok(data) => {
      let tags = endpoint.provides(&args, &data);
      let payload: Payload = Arc::new(data);
      client.inner.store.fulfill(&key, payload.clone(), tags);
      debug!(%key, "fetch fulfilled");
      Ok(payload)
    }
    Err(err) => {
      warn!(%key, error = %err, "fetch failed");
      client
        .inner
        .store
        .update(&key, |previous| CacheEntry::failed(previous, err.clone()));
      Err(err)
    }
  };

  let invalidated = client.inner.executor.finish(&key);
  if invalidated && result.is_ok() {
    // The response may predate the mutation that invalidated it
    client.inner.store.mark_stale(&key);
    if client.subscriber_count(&key) > 0 {
      client.refetch_key(&key);
    }
  }
  client.retain_if_unused(&key);

  result
}

pub(crate) fn decode<R: DeserializeOwned>(body: &[u8]) -> Result<R, FetchError> {
  serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))
}
