//! Invalidation tags and the index from tags to dependent cache keys.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use super::key::CacheKey;

/// Identifier half of a [`Tag`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagId {
  /// The collection as a whole ("LIST")
  List,
  Id(u64),
}

/// Structured invalidation tag, e.g. `product/LIST` or `product/42`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
  pub kind: &'static str,
  pub id: TagId,
}

impl Tag {
  pub fn list(kind: &'static str) -> Self {
    Self {
      kind,
      id: TagId::List,
    }
  }

  pub fn id(kind: &'static str, id: u64) -> Self {
    Self {
      kind,
      id: TagId::Id(id),
    }
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.id {
      TagId::List => write!(f, "{}/LIST", self.kind),
      TagId::Id(id) => write!(f, "{}/{}", self.kind, id),
    }
  }
}

/// Many-to-many relation between tags and cache keys.
///
/// Both directions are indexed so that resolving a tag and dropping every
/// binding of an evicted key are cheap.
#[derive(Debug, Default)]
pub struct TagIndex {
  by_tag: HashMap<Tag, HashSet<CacheKey>>,
  by_key: HashMap<CacheKey, HashSet<Tag>>,
}

impl TagIndex {
  pub fn bind(&mut self, tag: Tag, key: CacheKey) {
    self
      .by_key
      .entry(key.clone())
      .or_default()
      .insert(tag.clone());
    self.by_tag.entry(tag).or_default().insert(key);
  }

  pub fn unbind(&mut self, tag: &Tag, key: &CacheKey) {
    if let Some(keys) = self.by_tag.get_mut(tag) {
      keys.remove(key);
      if keys.is_empty() {
        self.by_tag.remove(tag);
      }
    }
    if let Some(tags) = self.by_key.get_mut(key) {
      tags.remove(tag);
      if tags.is_empty() {
        self.by_key.remove(key);
      }
    }
  }

  /// Keys currently bound to `tag`.
  pub fn resolve(&self, tag: &Tag) -> HashSet<CacheKey> {
    self.by_tag.get(tag).cloned().unwrap_or_default()
  }

  /// Deduplicated union of the keys bound to any of `tags`.
  pub fn resolve_all<'a>(&self, tags: impl IntoIterator<Item = &'a Tag>) -> BTreeSet<CacheKey> {
    tags.into_iter().flat_map(|tag| self.resolve(tag)).collect()
  }

  /// Replace every binding of `key` with `tags`.
  pub fn rebind(&mut self, key: &CacheKey, tags: impl IntoIterator<Item = Tag>) {
    self.unbind_key(key);
    for tag in tags {
      self.bind(tag, key.clone());
    }
  }

  /// Drop every binding of `key`.
  pub fn unbind_key(&mut self, key: &CacheKey) {
    for tag in self.tags_for(key) {
      self.unbind(&tag, key);
    }
  }

  pub fn tags_for(&self, key: &CacheKey) -> HashSet<Tag> {
    self.by_key.get(key).cloned().unwrap_or_default()
  }
}
