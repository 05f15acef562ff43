//! Catalog endpoints and the facade views use to reach them.

use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{Category, Product, ProductPage, ProductPatch};
use crate::cache::{CacheResult, CacheSource, Tag};
use crate::client::{
  ApiClient, FetchError, HttpTransport, MutationDef, MutationEndpoint, QueryDef, QueryEndpoint,
  Registry, RegistryError, RequestSpec,
};
use crate::config::Config;
use crate::query::{Mutation, Query};

pub const PRODUCT: &str = "product";
pub const CATEGORY: &str = "category";

/// Arguments of `getProducts`.
///
/// `limit = 0` asks for every record; `skip` is then always 0 so all such
/// requests share one cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProductsArgs {
  limit: u32,
  skip: u32,
}

impl ProductsArgs {
  pub fn new(limit: u32, skip: u32) -> Self {
    let skip = if limit == 0 { 0 } else { skip };
    Self { limit, skip }
  }

  /// Zero-based page of `size` records.
  pub fn page(page: u32, size: u32) -> Self {
    Self::new(size, page.saturating_mul(size))
  }

  pub fn all() -> Self {
    Self::new(0, 0)
  }
}

/// Arguments of `updateProduct`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateProduct {
  pub id: u64,
  pub patch: ProductPatch,
}

/// Handles for every catalog endpoint.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEndpoints {
  pub products: QueryEndpoint<ProductsArgs, ProductPage>,
  pub product: QueryEndpoint<u64, Product>,
  pub categories: QueryEndpoint<(), Vec<Category>>,
  pub update_product: MutationEndpoint<UpdateProduct, Product>,
}

impl CatalogEndpoints {
  pub fn register(registry: &mut Registry) -> Result<Self, RegistryError> {
    let products = registry.register_query(QueryDef {
      name: "getProducts",
      request: |args: &ProductsArgs| {
        RequestSpec::get("products")
          .query_param("limit", args.limit)
          .query_param("skip", args.skip)
      },
      provides: |_: &ProductsArgs, page: &ProductPage| {
        let mut tags = vec![Tag::list(PRODUCT)];
        tags.extend(page.products.iter().map(|p| Tag::id(PRODUCT, p.id)));
        tags
      },
    })?;

    let product = registry.register_query(QueryDef {
      name: "getProductById",
      request: |id: &u64| RequestSpec::get(format!("products/{}", id)),
      provides: |id: &u64, _: &Product| vec![Tag::id(PRODUCT, *id)],
    })?;

    let categories = registry.register_query(QueryDef {
      name: "getCategories",
      request: |_: &()| RequestSpec::get("products/categories"),
      provides: |_: &(), _: &Vec<Category>| vec![Tag::list(CATEGORY)],
    })?;

    let update_product = registry.register_mutation(MutationDef {
      name: "updateProduct",
      request: |args: &UpdateProduct| {
        RequestSpec::patch(format!("products/{}", args.id)).json_body(&args.patch)
      },
      invalidates: |args: &UpdateProduct, _: &Product| {
        vec![Tag::list(PRODUCT), Tag::id(PRODUCT, args.id)]
      },
    })?;

    Ok(Self {
      products,
      product,
      categories,
      update_product,
    })
  }
}

/// The client plus the catalog endpoint handles. Cheap to clone.
#[derive(Clone)]
pub struct CatalogApi {
  client: ApiClient,
  endpoints: CatalogEndpoints,
}

impl CatalogApi {
  pub fn new(client: ApiClient, endpoints: CatalogEndpoints) -> Self {
    Self { client, endpoints }
  }

  /// Build the HTTP-backed client described by `config`.
  pub fn connect(config: &Config) -> Result<Self> {
    let transport = HttpTransport::new(
      &config.base_url()?,
      Duration::from_secs(config.catalog.timeout_secs),
    )?;
    let mut registry = Registry::new();
    let endpoints = CatalogEndpoints::register(&mut registry)
      .map_err(|e| eyre!("Failed to register catalog endpoints: {}", e))?;
    let client = ApiClient::new(
      transport,
      registry,
      Duration::from_secs(config.cache.keep_unused_secs),
    );
    Ok(Self::new(client, endpoints))
  }

  pub fn client(&self) -> &ApiClient {
    &self.client
  }

  #[cfg(test)]
  pub fn endpoints(&self) -> &CatalogEndpoints {
    &self.endpoints
  }

  pub fn products(&self, args: ProductsArgs) -> Query<ProductPage> {
    Query::new(&self.client, &self.endpoints.products, &args)
  }

  pub fn product(&self, id: u64) -> Query<Product> {
    Query::new(&self.client, &self.endpoints.product, &id)
  }

  pub fn categories(&self) -> Query<Vec<Category>> {
    Query::new(&self.client, &self.endpoints.categories, &())
  }

  pub fn update_product(&self) -> Mutation<UpdateProduct, Product> {
    Mutation::new(&self.client, &self.endpoints.update_product)
  }

  /// One-shot cache-first read of a product page.
  pub async fn get_products(
    &self,
    args: ProductsArgs,
  ) -> Result<CacheResult<ProductPage>, FetchError> {
    self.client.query(&self.endpoints.products, &args).await
  }

  /// Warm the cache for a page nobody subscribes to yet.
  ///
  /// The entry falls under the usual retention window, so an unvisited page
  /// is evicted again.
  pub fn prefetch_products(&self, args: ProductsArgs) {
    let api = self.clone();
    tokio::spawn(async move {
      match api.get_products(args).await {
        Ok(result) => match result.source {
          CacheSource::Network => {
            debug!(?args, products = result.data.products.len(), "prefetched products")
          }
          CacheSource::CacheFresh | CacheSource::CacheStale => debug!(
            ?args,
            cached_at = ?result.cached_at,
            stale = result.is_stale(),
            "products already cached"
          ),
        },
        Err(e) => warn!(?args, error = %e, "prefetching products failed"),
      }
    });
  }
}
