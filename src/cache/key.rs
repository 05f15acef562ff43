//! Cache keys: an endpoint name plus its canonically serialized arguments.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Identifies one cached result: `(endpoint_name, canonical_args)`.
///
/// Two argument values that serialize to the same JSON document (ignoring
/// object key order) map to the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
  endpoint: &'static str,
  args: String,
}

impl CacheKey {
  /// Build a key from an endpoint name and its arguments.
  pub fn new<A: Serialize + ?Sized>(endpoint: &'static str, args: &A) -> serde_json::Result<Self> {
    Ok(Self {
      endpoint,
      args: canonical_serialize(args)?,
    })
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}({})", self.endpoint, self.args)
  }
}

/// Serialize `args` to compact JSON with object keys sorted at every level.
pub fn canonical_serialize<A: Serialize + ?Sized>(args: &A) -> serde_json::Result<String> {
  let value = serde_json::to_value(args)?;
  serde_json::to_string(&canonicalize(value))
}

/// Rebuild objects in key order. `serde_json::Map` keeps insertion order when
/// the `preserve_order` feature is enabled anywhere in the build, so sorting
/// is done here rather than relying on the default `BTreeMap` backing.
fn canonicalize(value: Value) -> Value {
  match value {
    Value::Object(map) => {
      let mut entries: Vec<(String, Value)> = map.into_iter().collect();
      entries.sort_by(|a, b| a.0.cmp(&b.0));
      let sorted: Map<String, Value> = entries
        .into_iter()
        .map(|(k, v)| (k, canonicalize(v)))
        .collect();
      Value::Object(sorted)
    }
    Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
    other => other,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Serialize;

  #[derive(Serialize)]
  struct LimitFirst {
    limit: u32,
    skip: u32,
  }

  #[derive(Serialize)]
  struct SkipFirst {
    skip: u32,
    limit: u32,
  }

  #[test]
  fn test_argument_order_does_not_matter() {
    let a = CacheKey::new("getProducts", &LimitFirst { limit: 10, skip: 0 }).unwrap();
    let b = CacheKey::new("getProducts", &SkipFirst { skip: 0, limit: 10 }).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_string(), r#"getProducts({"limit":10,"skip":0})"#);
  }

  #[test]
  fn test_nested_objects_are_sorted() {
    let value = serde_json::json!({"b": {"z": 1, "a": [{"y": 2, "x": 1}]}, "a": null});
    assert_eq!(
      canonical_serialize(&value).unwrap(),
      r#"{"a":null,"b":{"a":[{"x":1,"y":2}],"z":1}}"#
    );
  }

  #[test]
  fn test_endpoint_name_is_part_of_the_key() {
    let a = CacheKey::new("getProductById", &1u64).unwrap();
    let b = CacheKey::new("getProducts", &1u64).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn test_unit_args() {
    let key = CacheKey::new("getCategories", &()).unwrap();
    assert_eq!(key.to_string(), "getCategories(null)");
  }
}
