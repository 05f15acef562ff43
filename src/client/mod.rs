//! Typed remote-resource client with single-flight fetching and tag invalidation.
//!
//! Flow:
//! - [`ApiClient::query`] answers from the cache when it can and fetches otherwise
//! - [`ApiClient::fetch`] always goes to the network, joining an identical
//!   in-flight request instead of issuing a second one
//! - [`ApiClient::subscribe`] registers interest in a key and keeps it fresh
//! - [`ApiClient::mutate`] runs a mutation, then invalidates the tags it names

mod endpoint;
mod error;
mod executor;
mod subscription;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use endpoint::{
  Args, MutationDef, MutationEndpoint, QueryDef, QueryEndpoint, Registry, RequestSpec, Response,
};
pub use error::{FetchError, RegistryError};
pub use subscription::{QuerySnapshot, Subscription};
pub use transport::{HttpTransport, Transport};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheKey, CacheResult, CacheStore, Tag};
use endpoint::EndpointKind;
use executor::Executor;
use subscription::SubscriptionManager;

/// Shared handle to the cache and its network layer. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
  inner: Arc<Inner>,
}

struct Inner {
  transport: Arc<dyn Transport>,
  registry: Registry,
  store: CacheStore,
  executor: Executor,
  subscriptions: SubscriptionManager,
}

impl ApiClient {
  /// Create a client over `transport` with an empty cache.
  ///
  /// `keep_unused` is how long an entry with no subscribers survives before
  /// eviction.
  pub fn new(transport: impl Transport + 'static, registry: Registry, keep_unused: Duration) -> Self {
    debug!(endpoints = registry.len(), ?keep_unused, "creating api client");
    Self {
      inner: Arc::new(Inner {
        transport: Arc::new(transport),
        registry,
        store: CacheStore::new(),
        executor: Executor::default(),
        subscriptions: SubscriptionManager::new(keep_unused),
      }),
    }
  }

  #[cfg(test)]
  pub fn store(&self) -> &CacheStore {
    &self.inner.store
  }

  /// Handles created by another client's registry are refused.
  fn check_registered(&self, name: &'static str, kind: EndpointKind) -> Result<(), FetchError> {
    match self.inner.registry.kind(name) {
      Some(registered) if registered == kind => Ok(()),
      _ => Err(FetchError::Unregistered(name)),
    }
  }

  pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
    self.inner.store.get(key)
  }

  /// Cache-first read.
  ///
  /// Fresh data is returned as is. Stale data is returned immediately while
  /// a background refetch starts. Without data the call waits for a fetch.
  pub async fn query<A: Args, R: Response>(
    &self,
    endpoint: &QueryEndpoint<A, R>,
    args: &A,
  ) -> Result<CacheResult<R>, FetchError> {
    self.check_registered(endpoint.name(), EndpointKind::Query)?;
    let key = endpoint.key(args)?;
    self.remember(&key, endpoint, args);

    if let Some(entry) = self.inner.store.get(&key) {
      if let Some(data) = entry.data::<R>() {
        if !entry.stale {
          debug!(%key, "cache hit");
          return Ok(CacheResult::from_cache(data, entry.fetched_at, false));
        }
        debug!(%key, "stale cache hit, refetching in background");
        let _ = self.begin(&key, *endpoint, args);
        return Ok(CacheResult::from_cache(data, entry.fetched_at, true));
      }
    }

    let data = self.fetch(endpoint, args).await?;
    Ok(CacheResult::from_network(data))
  }

  /// Network read, deduplicated against any in-flight fetch of the same key.
  pub async fn fetch<A: Args, R: Response>(
    &self,
    endpoint: &QueryEndpoint<A, R>,
    args: &A,
  ) -> Result<Arc<R>, FetchError> {
    self.check_registered(endpoint.name(), EndpointKind::Query)?;
    let key = endpoint.key(args)?;
    self.remember(&key, endpoint, args);
    let payload = self.begin(&key, *endpoint, args).await?;
    payload.downcast::<R>().map_err(|_| {
      FetchError::Decode(format!("cached value for {} has an unexpected type", key))
    })
  }

  /// Run a mutation and invalidate the tags it names.
  ///
  /// Invalidation happens before this returns, so dependent entries are
  /// already stale (and refetching, if subscribed) when the caller resumes.
  pub async fn mutate<A: Args, R: Response>(
    &self,
    endpoint: &MutationEndpoint<A, R>,
    args: &A,
  ) -> Result<Arc<R>, FetchError> {
    self.check_registered(endpoint.name(), EndpointKind::Mutation)?;
    let request = endpoint.request(args)?;
    info!(endpoint = endpoint.name(), path = %request.path, "running mutation");

    let outcome = self
      .inner
      .transport
      .send(request)
      .await
      .and_then(|body| executor::decode::<R>(&body));
    let result = match outcome {
      Ok(result) => result,
      Err(err) => {
        warn!(endpoint = endpoint.name(), error = %err, "mutation failed");
        return Err(err);
      }
    };

    let tags = endpoint.invalidates(args, &result);
    self.invalidate_tags(&tags);
    Ok(Arc::new(result))
  }

  /// Mark every entry bound to any of `tags` stale and refetch the ones
  /// somebody is subscribed to. Returns the affected keys.
  pub fn invalidate_tags(&self, tags: &[Tag]) -> Vec<CacheKey> {
    let keys = self.inner.store.invalidate(tags);
    let mut refetched = 0;
    for key in &keys {
      if self.inner.executor.mark_dirty_if_in_flight(key) {
        // The running fetch may predate the change; it refetches when done
        continue;
      }
      if self.subscriber_count(key) > 0 {
        self.refetch_key(key);
        refetched += 1;
      }
    }
    info!(
      tags = %display_tags(tags),
      invalidated = keys.len(),
      refetched,
      "invalidated tags"
    );
    keys
  }

  /// Number of active subscriptions for `key`.
  pub fn subscriber_count(&self, key: &CacheKey) -> usize {
    self.inner.subscriptions.count(key)
  }

  /// Number of fetches currently waiting on the network.
  pub fn in_flight(&self) -> usize {
    self.inner.executor.in_flight_count()
  }

  /// Number of keys with a cache entry.
  pub fn cached(&self) -> usize {
    self.inner.store.len()
  }
}

fn display_tags(tags: &[Tag]) -> String {
  tags
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(",")
}
