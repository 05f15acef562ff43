//! Endpoint definitions and the registry that hands out typed handles.
//!
//! Definitions describe requests as plain data ([`RequestSpec`]) and tags as
//! pure functions of the arguments and the decoded result, so nothing here
//! knows about HTTP clients.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::error::{FetchError, RegistryError};
use crate::cache::{CacheKey, Tag};

/// Bounds every endpoint argument type satisfies.
pub trait Args: Serialize + Clone + Send + Sync + 'static {}
impl<T> Args for T where T: Serialize + Clone + Send + Sync + 'static {}

/// Bounds every endpoint response type satisfies.
pub trait Response: DeserializeOwned + Send + Sync + 'static {}
impl<T> Response for T where T: DeserializeOwned + Send + Sync + 'static {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Patch,
}

/// A request relative to the service base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
  pub method: Method,
  /// Path relative to the base URL, without a leading slash
  pub path: String,
  pub query: Vec<(String, String)>,
  pub body: Option<Value>,
}

impl RequestSpec {
  pub fn new(method: Method, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
      query: Vec::new(),
      body: None,
    }
  }

  pub fn get(path: impl Into<String>) -> Self {
    Self::new(Method::Get, path)
  }

  pub fn patch(path: impl Into<String>) -> Self {
    Self::new(Method::Patch, path)
  }

  pub fn query_param(mut self, name: &str, value: impl ToString) -> Self {
    self.query.push((name.to_string(), value.to_string()));
    self
  }

  pub fn json_body<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, FetchError> {
    self.body = Some(serde_json::to_value(body).map_err(|e| FetchError::Encode(e.to_string()))?);
    Ok(self)
  }
}

/// Declaration of a read-only endpoint.
pub struct QueryDef<A, R> {
  pub name: &'static str,
  pub request: fn(&A) -> RequestSpec,
  /// Tags the result depends on
  pub provides: fn(&A, &R) -> Vec<Tag>,
}

/// Declaration of a state-changing endpoint.
pub struct MutationDef<A, R> {
  pub name: &'static str,
  pub request: fn(&A) -> Result<RequestSpec, FetchError>,
  /// Tags whose cached results this mutation makes outdated
  pub invalidates: fn(&A, &R) -> Vec<Tag>,
}

/// Handle to a registered query. Only [`Registry::register_query`] creates one.
pub struct QueryEndpoint<A, R> {
  def: QueryDef<A, R>,
}

/// Handle to a registered mutation. Only [`Registry::register_mutation`] creates one.
pub struct MutationEndpoint<A, R> {
  def: MutationDef<A, R>,
}

impl<A, R> QueryEndpoint<A, R> {
  pub fn name(&self) -> &'static str {
    self.def.name
  }

  pub fn request(&self, args: &A) -> RequestSpec {
    (self.def.request)(args)
  }

  pub fn provides(&self, args: &A, result: &R) -> Vec<Tag> {
    (self.def.provides)(args, result)
  }
}

impl<A: Serialize, R> QueryEndpoint<A, R> {
  pub fn key(&self, args: &A) -> Result<CacheKey, FetchError> {
    CacheKey::new(self.def.name, args).map_err(|e| FetchError::Encode(e.to_string()))
  }
}

impl<A, R> MutationEndpoint<A, R> {
  pub fn name(&self) -> &'static str {
    self.def.name
  }

  pub fn request(&self, args: &A) -> Result<RequestSpec, FetchError> {
    (self.def.request)(args)
  }

  pub fn invalidates(&self, args: &A, result: &R) -> Vec<Tag> {
    (self.def.invalidates)(args, result)
  }
}

// Manual impls: the derives would demand `A: Clone, R: Clone`.
impl<A, R> Clone for QueryDef<A, R> {
  fn clone(&self) -> Self {
    *self
  }
}
impl<A, R> Copy for QueryDef<A, R> {}

impl<A, R> Clone for MutationDef<A, R> {
  fn clone(&self) -> Self {
    *self
  }
}
impl<A, R> Copy for MutationDef<A, R> {}

impl<A, R> Clone for QueryEndpoint<A, R> {
  fn clone(&self) -> Self {
    *self
  }
}
impl<A, R> Copy for QueryEndpoint<A, R> {}

impl<A, R> Clone for MutationEndpoint<A, R> {
  fn clone(&self) -> Self {
    *self
  }
}
impl<A, R> Copy for MutationEndpoint<A, R> {}

impl<A, R> fmt::Debug for QueryEndpoint<A, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("QueryEndpoint").field(&self.def.name).finish()
  }
}

impl<A, R> fmt::Debug for MutationEndpoint<A, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("MutationEndpoint").field(&self.def.name).finish()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
  Query,
  Mutation,
}

/// Append-only set of endpoint names.
///
/// Filled at startup, then moved into the client, after which it can no
/// longer change.
#[derive(Debug, Default)]
pub struct Registry {
  endpoints: BTreeMap<&'static str, EndpointKind>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register_query<A: Args, R: Response>(
    &mut self,
    def: QueryDef<A, R>,
  ) -> Result<QueryEndpoint<A, R>, RegistryError> {
    self.claim(def.name, EndpointKind::Query)?;
    Ok(QueryEndpoint { def })
  }

  pub fn register_mutation<A: Args, R: Response>(
    &mut self,
    def: MutationDef<A, R>,
  ) -> Result<MutationEndpoint<A, R>, RegistryError> {
    self.claim(def.name, EndpointKind::Mutation)?;
    Ok(MutationEndpoint { def })
  }

  fn claim(&mut self, name: &'static str, kind: EndpointKind) -> Result<(), RegistryError> {
    if self.endpoints.contains_key(name) {
      return Err(RegistryError::DuplicateEndpoint(name));
    }
    self.endpoints.insert(name, kind);
    Ok(())
  }

  pub fn kind(&self, name: &str) -> Option<EndpointKind> {
    self.endpoints.get(name).copied()
  }

  pub fn len(&self) -> usize {
    self.endpoints.len()
  }
}
