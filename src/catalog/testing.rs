//! In-memory catalog service for tests above the client layer.

use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::api::{CatalogApi, CatalogEndpoints};
use crate::client::testing::{json, FakeTransport, Method};
use crate::client::{ApiClient, FetchError, Registry, RequestSpec, Transport};

pub(crate) fn catalog(transport: impl Transport + 'static) -> CatalogApi {
  let mut registry = Registry::new();
  let endpoints = CatalogEndpoints::register(&mut registry).unwrap();
  let client = ApiClient::new(transport, registry, Duration::from_secs(60));
  CatalogApi::new(client, endpoints)
}

pub(crate) fn product_json(id: u64, price: f64) -> Value {
  json!({
    "id": id,
    "title": format!("Product {}", id),
    "description": format!("Description of product {}", id),
    "category": "beauty",
    "price": price,
    "stock": 10,
    "brand": "Essence",
    "rating": 4.5,
    "availabilityStatus": "In Stock",
    "tags": ["beauty"],
    "meta": { "createdAt": "2024-05-23T08:56:21.618Z", "updatedAt": "2024-05-23T08:56:21.618Z" }
  })
}

fn query_param(request: &RequestSpec, name: &str) -> usize {
  request
    .query
    .iter()
    .find(|(key, _)| key == name)
    .and_then(|(_, value)| value.parse::<usize>().ok())
    .unwrap_or(0)
}

/// `count` products priced by id. PATCH merges the body into the record
/// like the real service echoes it back.
pub(crate) fn fake_catalog(count: u64) -> FakeTransport {
  let products: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(
    (1..=count).map(|id| product_json(id, id as f64)).collect(),
  ));
  FakeTransport::new(move |request: &RequestSpec| {
    let mut products = products.lock().unwrap();
    let path = request.path.as_str();
    match (request.method, path) {
      (Method::Get, "products") => {
        let (limit, skip) = (query_param(request, "limit"), query_param(request, "skip"));
        let (skip, limit) = if limit == 0 { (0, products.len()) } else { (skip, limit) };
        let page: Vec<Value> = products.iter().skip(skip).take(limit).cloned().collect();
        json(json!({ "products": page, "total": products.len(), "skip": skip, "limit": limit }))
      }
      (Method::Get, "products/categories") => json(json!([
        {
          "slug": "beauty",
          "name": "Beauty",
          "url": "https://dummyjson.com/products/category/beauty"
        },
        {
          "slug": "fragrances",
          "name": "Fragrances",
          "url": "https://dummyjson.com/products/category/fragrances"
        }
      ])),
      (method, path) if path.starts_with("products/") => {
        let id: usize = path
          .trim_start_matches("products/")
          .parse()
          .map_err(|_| FetchError::HttpStatus { code: 404 })?;
        let record = products
          .get_mut(id.wrapping_sub(1))
          .ok_or(FetchError::HttpStatus { code: 404 })?;
        if method == Method::Patch {
          let patch = request.body.clone().unwrap_or(Value::Object(Map::new()));
          if let (Value::Object(record), Value::Object(patch)) = (&mut *record, patch) {
            record.extend(patch);
          }
        }
        json(record.clone())
      }
      _ => Err(FetchError::HttpStatus { code: 404 }),
    }
  })
}

pub(crate) fn fake_api(count: u64) -> (CatalogApi, FakeTransport) {
  let transport = fake_catalog(count);
  (catalog(transport.clone()), transport)
}
