//! View-side handles over the client: `Query<R>` for reads, `Mutation<A, R>`
//! for writes.
//!
//! Inspired by TanStack Query. A `Query` subscribes on creation and
//! unsubscribes when dropped, so a view owning one keeps its data alive
//! exactly as long as the view is on screen.
//!
//! # Example
//!
//! ```ignore
//! let mut query = Query::new(&client, &endpoints.product, &1);
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(data) => render_data(&data),
//!     QueryState::Error(e) => render_error(&e),
//! }
//! ```

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::client::{
  ApiClient, Args, FetchError, MutationEndpoint, QueryEndpoint, QuerySnapshot, Response,
  Subscription,
};

/// The state of a query, from the point of view of a renderer
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// No data yet, fetch in flight
  Loading,
  /// Data is available (possibly stale, possibly refreshing)
  Success(Arc<T>),
  /// The fetch failed and there is no earlier data to fall back to
  Error(FetchError),
}

/// Subscribed query with a locally cached snapshot.
///
/// The snapshot only changes in [`Query::poll`], so a render pass sees one
/// consistent view of the entry.
pub struct Query<R> {
  subscription: Option<Subscription<R>>,
  snapshot: QuerySnapshot<R>,
  /// Set when the subscription itself could not be created
  setup_error: Option<FetchError>,
}

impl<R: Response> Query<R> {
  /// Subscribe to `(endpoint, args)`. Fetches if nothing usable is cached.
  pub fn new<A: Args>(client: &ApiClient, endpoint: &QueryEndpoint<A, R>, args: &A) -> Self {
    match client.subscribe(endpoint, args) {
      Ok(mut subscription) => {
        subscription.mark_seen();
        let snapshot = subscription.snapshot();
        Self {
          subscription: Some(subscription),
          snapshot,
          setup_error: None,
        }
      }
      Err(err) => Self {
        subscription: None,
        snapshot: empty_snapshot(),
        setup_error: Some(err),
      },
    }
  }

  pub fn state(&self) -> QueryState<R> {
    if let Some(data) = &self.snapshot.data {
      return QueryState::Success(data.clone());
    }
    match self.error() {
      Some(err) => QueryState::Error(err.clone()),
      None => QueryState::Loading,
    }
  }

  /// Last known data, stale or not.
  pub fn data(&self) -> Option<&R> {
    self.snapshot.data.as_deref()
  }

  /// Shared handle to the data, for views that keep it past the next poll.
  pub fn data_arc(&self) -> Option<Arc<R>> {
    self.snapshot.data.clone()
  }

  /// No data to show yet.
  pub fn is_loading(&self) -> bool {
    self.subscription.is_some() && self.snapshot.is_loading()
  }

  /// A request is on the wire, with or without data to show meanwhile.
  pub fn is_fetching(&self) -> bool {
    self.snapshot.is_fetching()
  }

  pub fn is_stale(&self) -> bool {
    self.snapshot.stale
  }

  pub fn is_error(&self) -> bool {
    self.error().is_some()
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.setup_error.as_ref().or(self.snapshot.error.as_ref())
  }

  /// Force a refetch, joining one already in flight.
  pub fn refetch(&mut self) {
    if let Some(subscription) = &self.subscription {
      subscription.refetch();
    }
  }

  /// Pick up changes to the underlying entry.
  ///
  /// Returns `true` if the state changed. Call this in your event loop tick
  /// handler.
  pub fn poll(&mut self) -> bool {
    let Some(subscription) = &mut self.subscription else {
      return false;
    };
    if !subscription.has_changed() {
      return false;
    }
    subscription.mark_seen();
    self.snapshot = subscription.snapshot();
    true
  }
}

fn empty_snapshot<R>() -> QuerySnapshot<R> {
  QuerySnapshot {
    data: None,
    status: None,
    error: None,
    stale: false,
    fetched_at: None,
  }
}

impl<R: std::fmt::Debug> std::fmt::Debug for Query<R> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("subscription", &self.subscription)
      .field("snapshot", &self.snapshot)
      .finish_non_exhaustive()
  }
}

/// The state of a mutation
#[derive(Debug, Clone)]
pub enum MutationState<T> {
  Idle,
  Running,
  Success(Arc<T>),
  Error(FetchError),
}

/// Fire-and-poll wrapper around [`ApiClient::mutate`].
pub struct Mutation<A, R> {
  client: ApiClient,
  endpoint: MutationEndpoint<A, R>,
  state: MutationState<R>,
  receiver: Option<mpsc::UnboundedReceiver<Result<Arc<R>, FetchError>>>,
}

impl<A: Args, R: Response> Mutation<A, R> {
  pub fn new(client: &ApiClient, endpoint: &MutationEndpoint<A, R>) -> Self {
    Self {
      client: client.clone(),
      endpoint: *endpoint,
      state: MutationState::Idle,
      receiver: None,
    }
  }

  pub fn state(&self) -> &MutationState<R> {
    &self.state
  }

  pub fn is_running(&self) -> bool {
    matches!(self.state, MutationState::Running)
  }

  /// Start the mutation. Ignored while a previous trigger is still running.
  pub fn trigger(&mut self, args: A) {
    if self.is_running() {
      return;
    }
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = MutationState::Running;

    let client = self.client.clone();
    let endpoint = self.endpoint;
    tokio::spawn(async move {
      let result = client.mutate(&endpoint, &args).await;
      // Ignore send errors - the view may be gone
      let _ = tx.send(result);
    });
  }

  /// Poll for the outcome of a running mutation.
  ///
  /// Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(result)) => {
        self.state = MutationState::Success(result);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = MutationState::Error(error);
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.state = MutationState::Error(FetchError::Network("mutation was cancelled".to_string()));
        self.receiver = None;
        true
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::Tag;
  use crate::client::testing::{json, settle, FakeTransport};
  use crate::client::{MutationDef, QueryDef, Registry, RequestSpec};
  use serde_json::json;
  use std::sync::atomic::{AtomicU64, Ordering};
  use std::time::Duration;

  struct Fixture {
    client: ApiClient,
    fake: FakeTransport,
    counter: QueryEndpoint<(), u64>,
    bump: MutationEndpoint<u64, u64>,
  }

  fn fixture() -> Fixture {
    let value = Arc::new(AtomicU64::new(1));
    let fake = FakeTransport::new(move |request: &RequestSpec| match &request.body {
      Some(body) => {
        value.fetch_add(body.as_u64().unwrap(), Ordering::SeqCst);
        json(json!(value.load(Ordering::SeqCst)))
      }
      None => json(json!(value.load(Ordering::SeqCst))),
    });

    let mut registry = Registry::new();
    let counter = registry
      .register_query(QueryDef {
        name: "getCounter",
        request: |_: &()| RequestSpec::get("counter"),
        provides: |_: &(), _: &u64| vec![Tag::list("counter")],
      })
      .unwrap();
    let bump = registry
      .register_mutation(MutationDef {
        name: "bumpCounter",
        request: |by: &u64| RequestSpec::patch("counter").json_body(by),
        invalidates: |_: &u64, _: &u64| vec![Tag::list("counter")],
      })
      .unwrap();

    let client = ApiClient::new(fake.clone(), registry, Duration::from_secs(60));
    Fixture {
      client,
      fake,
      counter,
      bump,
    }
  }

  #[tokio::test]
  async fn test_query_success() {
    let f = fixture();
    let mut query = Query::new(&f.client, &f.counter, &());
    assert!(query.is_loading());
    assert!(matches!(query.state(), QueryState::Loading));

    settle().await;

    assert!(query.poll());
    assert!(matches!(query.state(), QueryState::Success(_)));
    assert_eq!(query.data(), Some(&1));
    assert!(!query.is_fetching());
    assert!(!query.poll());
  }

  #[tokio::test]
  async fn test_query_error() {
    let f = fixture();
    f.fake
      .set_handler(|_: &RequestSpec| Err(FetchError::HttpStatus { code: 500 }));
    let mut query = Query::new(&f.client, &f.counter, &());

    settle().await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error(), Some(&FetchError::HttpStatus { code: 500 }));
    assert!(matches!(query.state(), QueryState::Error(_)));
  }

  #[tokio::test]
  async fn test_query_on_foreign_endpoint_reports_error() {
    let f = fixture();
    let mut other = Registry::new();
    let stray = other
      .register_query(QueryDef {
        name: "getStray",
        request: |_: &()| RequestSpec::get("stray"),
        provides: |_: &(), _: &u64| vec![Tag::list("stray")],
      })
      .unwrap();

    let mut query = Query::new(&f.client, &stray, &());
    assert!(!query.is_loading());
    assert_eq!(query.error(), Some(&FetchError::Unregistered("getStray")));
    query.refetch();
    assert!(!query.poll());
    assert!(f.fake.calls().is_empty());
  }

  #[tokio::test]
  async fn test_refetch_updates_data() {
    let f = fixture();
    let mut query = Query::new(&f.client, &f.counter, &());
    settle().await;
    query.poll();

    f.fake.set_handler(|_: &RequestSpec| json(json!(7)));
    query.refetch();
    settle().await;

    assert!(query.poll());
    assert_eq!(query.data(), Some(&7));
    assert_eq!(f.fake.gets("counter"), 2);
  }

  #[tokio::test]
  async fn test_dropping_query_unsubscribes() {
    let f = fixture();
    let query = Query::new(&f.client, &f.counter, &());
    let key = f.counter.key(&()).unwrap();
    assert_eq!(f.client.subscriber_count(&key), 1);

    drop(query);
    assert_eq!(f.client.subscriber_count(&key), 0);
  }

  #[tokio::test]
  async fn test_mutation_refreshes_subscribed_query() {
    let f = fixture();
    let mut query = Query::new(&f.client, &f.counter, &());
    settle().await;
    query.poll();
    assert_eq!(query.data(), Some(&1));

    let mut bump = Mutation::new(&f.client, &f.bump);
    bump.trigger(4);
    assert!(bump.is_running());
    settle().await;

    assert!(bump.poll());
    assert!(matches!(bump.state(), MutationState::Success(n) if **n == 5));
    assert!(query.poll());
    assert_eq!(query.data(), Some(&5));
    assert!(!query.is_stale());
  }

  #[tokio::test]
  async fn test_mutation_error() {
    let f = fixture();
    f.fake
      .set_handler(|_: &RequestSpec| Err(FetchError::Network("offline".into())));
    let mut bump = Mutation::new(&f.client, &f.bump);
    assert!(matches!(bump.state(), MutationState::Idle));
    bump.trigger(1);
    assert!(bump.is_running());
    settle().await;

    assert!(bump.poll());
    assert!(matches!(
      bump.state(),
      MutationState::Error(FetchError::Network(msg)) if msg == "offline"
    ));
    assert!(!bump.is_running());
  }
}
