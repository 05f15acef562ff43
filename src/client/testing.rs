//! In-memory transport for exercising the client without a server.

use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub(crate) use super::endpoint::Method;
use super::endpoint::RequestSpec;
use super::error::FetchError;
use super::transport::Transport;
use super::ApiClient;

type Handler = Arc<dyn Fn(&RequestSpec) -> Result<Vec<u8>, FetchError> + Send + Sync>;

struct State {
  handler: Mutex<Handler>,
  calls: Mutex<Vec<RequestSpec>>,
  /// While held, GET requests wait for a permit before answering
  gated: AtomicBool,
  gate: Semaphore,
}

/// Answers requests with a swappable handler and records every call.
#[derive(Clone)]
pub(crate) struct FakeTransport {
  state: Arc<State>,
}

impl FakeTransport {
  pub fn new(
    handler: impl Fn(&RequestSpec) -> Result<Vec<u8>, FetchError> + Send + Sync + 'static,
  ) -> Self {
    Self {
      state: Arc::new(State {
        handler: Mutex::new(Arc::new(handler)),
        calls: Mutex::new(Vec::new()),
        gated: AtomicBool::new(false),
        gate: Semaphore::new(0),
      }),
    }
  }

  pub fn set_handler(
    &self,
    handler: impl Fn(&RequestSpec) -> Result<Vec<u8>, FetchError> + Send + Sync + 'static,
  ) {
    *self.state.handler.lock().unwrap() = Arc::new(handler);
  }

  /// Make GET requests wait until [`FakeTransport::open`] lets them through.
  pub fn hold(&self) {
    self.state.gated.store(true, Ordering::SeqCst);
  }

  /// Let `n` held GET requests answer.
  pub fn open(&self, n: usize) {
    self.state.gate.add_permits(n);
  }

  pub fn calls(&self) -> Vec<RequestSpec> {
    self.state.calls.lock().unwrap().clone()
  }

  /// Number of GET requests issued for `path`.
  pub fn gets(&self, path: &str) -> usize {
    self
      .calls()
      .iter()
      .filter(|call| call.method == Method::Get && call.path == path)
      .count()
  }
}

impl Transport for FakeTransport {
  fn send(&self, request: RequestSpec) -> BoxFuture<'static, Result<Vec<u8>, FetchError>> {
    let state = self.state.clone();
    async move {
      state.calls.lock().unwrap().push(request.clone());
      if request.method == Method::Get && state.gated.load(Ordering::SeqCst) {
        if let Ok(permit) = state.gate.acquire().await {
          permit.forget();
        }
      }
      let handler = state.handler.lock().unwrap().clone();
      handler(&request)
    }
    .boxed()
  }
}

pub(crate) fn json(value: serde_json::Value) -> Result<Vec<u8>, FetchError> {
  Ok(serde_json::to_vec(&value).unwrap())
}

/// Let spawned fetches and timers that are ready run to completion.
pub(crate) async fn settle() {
  for _ in 0..50 {
    tokio::task::yield_now().await;
  }
}

/// Settle, then check nothing but held requests is still running.
pub(crate) async fn settle_idle(client: &ApiClient) {
  settle().await;
  assert_eq!(client.in_flight(), 0, "fetches still in flight");
}
