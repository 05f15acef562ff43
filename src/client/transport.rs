//! Network seam between the cache core and the remote service.

use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::endpoint::{Method, RequestSpec};
use super::error::FetchError;

/// Performs one request/response exchange.
///
/// Implementations return the raw body of a 2xx response and classify every
/// other outcome as a [`FetchError`]. Decoding is left to the caller, which
/// knows the expected response type.
pub trait Transport: Send + Sync {
  fn send(&self, request: RequestSpec) -> BoxFuture<'static, Result<Vec<u8>, FetchError>>;
}

impl From<Method> for reqwest::Method {
  fn from(method: Method) -> Self {
    match method {
      Method::Get => reqwest::Method::GET,
      Method::Patch => reqwest::Method::PATCH,
    }
  }
}

/// JSON over HTTP via reqwest.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
}

impl HttpTransport {
  pub fn new(base_url: &Url, timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    // Relative paths join onto the last segment only when it ends in '/'
    let mut base_url = base_url.clone();
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    Ok(Self { client, base_url })
  }

  /// Absolute URL for a request, including its query string.
  pub fn url_for(&self, request: &RequestSpec) -> Result<Url, FetchError> {
    let mut url = self
      .base_url
      .join(request.path.trim_start_matches('/'))
      .map_err(|e| FetchError::Encode(format!("invalid path {}: {}", request.path, e)))?;
    if !request.query.is_empty() {
      let mut pairs = url.query_pairs_mut();
      for (name, value) in &request.query {
        pairs.append_pair(name, value);
      }
    }
    Ok(url)
  }
}

impl Transport for HttpTransport {
  fn send(&self, request: RequestSpec) -> BoxFuture<'static, Result<Vec<u8>, FetchError>> {
    let client = self.client.clone();
    let url = self.url_for(&request);

    async move {
      let url = url?;
      debug!(method = ?request.method, %url, "sending request");

      let mut builder = client
        .request(request.method.into(), url)
        .header(ACCEPT, "application/json");
      if let Some(body) = &request.body {
        let bytes = serde_json::to_vec(body).map_err(|e| FetchError::Encode(e.to_string()))?;
        builder = builder.header(CONTENT_TYPE, "application/json").body(bytes);
      }

      let response = builder
        .send()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;

      let status = response.status();
      if !status.is_success() {
        return Err(FetchError::HttpStatus {
          code: status.as_u16(),
        });
      }

      let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;
      Ok(body.to_vec())
    }
    .boxed()
  }
}
