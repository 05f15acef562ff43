//! Product catalog binding: wire types, endpoint declarations and the
//! `CatalogApi` handle the UI talks to.

pub mod api;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{CatalogApi, ProductsArgs, UpdateProduct};
pub use types::{parse_timestamp, Category, Product, ProductPage, ProductPatch, Review};
