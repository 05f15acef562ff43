//! Wire types for the product catalog service.
//!
//! Field names follow the service's camelCase JSON. Every field has a
//! default so records with missing fields still decode.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
  pub id: u64,
  pub title: String,
  pub description: String,
  pub category: String,
  pub price: f64,
  pub discount_percentage: f64,
  pub rating: f64,
  pub stock: u64,
  pub tags: Vec<String>,
  pub brand: String,
  pub sku: String,
  pub weight: f64,
  pub dimensions: Dimensions,
  pub warranty_information: String,
  pub shipping_information: String,
  pub availability_status: String,
  pub reviews: Vec<Review>,
  pub return_policy: String,
  pub minimum_order_quantity: u64,
  pub meta: ProductMeta,
  pub images: Vec<String>,
  pub thumbnail: String,
}

/// Centimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dimensions {
  pub width: f64,
  pub height: f64,
  pub depth: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Review {
  pub rating: f64,
  pub comment: String,
  pub date: String,
  pub reviewer_name: String,
  pub reviewer_email: String,
}

impl Review {
  /// Reviews without a comment or a rating are not worth sending back.
  pub fn is_complete(&self) -> bool {
    !self.comment.trim().is_empty() && self.rating > 0.0
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductMeta {
  pub created_at: String,
  pub updated_at: String,
  pub barcode: String,
  /// URL of the QR code image
  pub qr_code: String,
}

/// One page of `GET products`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductPage {
  pub products: Vec<Product>,
  pub total: u64,
  pub skip: u64,
  pub limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
  pub slug: String,
  pub name: String,
  pub url: String,
}

/// Partial product update. Unset fields are left out of the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub discount_percentage: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rating: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub stock: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tags: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub brand: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sku: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub weight: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub dimensions: Option<Dimensions>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub warranty_information: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub shipping_information: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub availability_status: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reviews: Option<Vec<Review>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub return_policy: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub minimum_order_quantity: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub meta: Option<MetaPatch>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub images: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub barcode: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub qr_code: Option<String>,
}

impl MetaPatch {
  fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}

fn changed<T: PartialEq + Clone>(before: &T, after: &T) -> Option<T> {
  (before != after).then(|| after.clone())
}

impl ProductPatch {
  /// Patch holding exactly the fields that differ between `before` and `after`.
  ///
  /// Incomplete reviews are dropped. A timestamp that does not parse, or was
  /// cleared, is left out of the patch. The edit form refuses to save either,
  /// so a shown change is never silently lost.
  pub fn between(before: &Product, after: &Product) -> Self {
    let meta = MetaPatch {
      created_at: changed(&before.meta.created_at, &after.meta.created_at)
        .and_then(|at| parse_timestamp(&at)),
      updated_at: changed(&before.meta.updated_at, &after.meta.updated_at)
        .and_then(|at| parse_timestamp(&at)),
      barcode: changed(&before.meta.barcode, &after.meta.barcode),
      qr_code: changed(&before.meta.qr_code, &after.meta.qr_code),
    };

    Self {
      title: changed(&before.title, &after.title),
      description: changed(&before.description, &after.description),
      category: changed(&before.category, &after.category),
      price: changed(&before.price, &after.price),
      discount_percentage: changed(&before.discount_percentage, &after.discount_percentage),
      rating: changed(&before.rating, &after.rating),
      stock: changed(&before.stock, &after.stock),
      tags: changed(&before.tags, &after.tags),
      brand: changed(&before.brand, &after.brand),
      sku: changed(&before.sku, &after.sku),
      weight: changed(&before.weight, &after.weight),
      dimensions: changed(&before.dimensions, &after.dimensions),
      warranty_information: changed(&before.warranty_information, &after.warranty_information),
      shipping_information: changed(&before.shipping_information, &after.shipping_information),
      availability_status: changed(&before.availability_status, &after.availability_status),
      reviews: changed(&before.reviews, &after.reviews).map(|reviews| complete_reviews(&reviews)),
      return_policy: changed(&before.return_policy, &after.return_policy),
      minimum_order_quantity: changed(
        &before.minimum_order_quantity,
        &after.minimum_order_quantity,
      ),
      meta: (!meta.is_empty()).then_some(meta),
      images: changed(&before.images, &after.images),
      thumbnail: changed(&before.thumbnail, &after.thumbnail),
    }
  }

  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }

  /// Names of the fields this patch sets, in wire form.
  pub fn fields(&self) -> Vec<String> {
    match serde_json::to_value(self) {
      Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
      _ => Vec::new(),
    }
  }
}

pub fn complete_reviews(reviews: &[Review]) -> Vec<Review> {
  reviews.iter().filter(|r| r.is_complete()).cloned().collect()
}

/// Accepts RFC 3339, or `YYYY-MM-DD HH:MM:SS` read as UTC.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
  let input = input.trim();
  if let Ok(at) = DateTime::parse_from_rfc3339(input) {
    return Some(at.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S")
    .ok()
    .map(|at| at.and_utc())
}
