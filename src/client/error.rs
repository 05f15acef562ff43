use thiserror::Error;

/// Why a query or mutation did not produce data.
///
/// `Clone` because a single in-flight fetch hands its outcome to every
/// caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// Transport failure, no response received
  #[error("network error: {0}")]
  Network(String),
  /// The service answered with a non-2xx status
  #[error("request failed with HTTP status {code}")]
  HttpStatus { code: u16 },
  /// The response body did not match the expected shape
  #[error("failed to decode response: {0}")]
  Decode(String),
  /// The request arguments could not be serialized
  #[error("failed to encode request: {0}")]
  Encode(String),
  /// The endpoint handle was not registered with this client
  #[error("endpoint `{0}` is not registered with this client")]
  Unregistered(&'static str),
}

impl FetchError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, FetchError::HttpStatus { code: 404 })
  }
}

/// Errors raised while declaring endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
  #[error("endpoint `{0}` is already registered")]
  DuplicateEndpoint(&'static str),
}
