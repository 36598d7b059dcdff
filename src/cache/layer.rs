//! The owned cache: schema, store and read options behind one handle.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::denormalizer::{denormalize_with, DenormalizeOptions};
use super::normalizer::{normalize, NormalizeError, Normalized};
use super::schema::{Schema, SchemaError};
use super::store::{EntityStore, StoreAction};
use super::traits::Entities;

#[derive(Debug, Error)]
pub enum CacheError {
  #[error(transparent)]
  Schema(#[from] SchemaError),

  #[error(transparent)]
  Normalize(#[from] NormalizeError),
}

/// Holds the single mutable [`EntityStore`] of an application.
///
/// `merge_entities` and `delete_entity` are its only mutations; everything
/// else reads. Construct one per composition root (or per test) and pass it
/// where it is needed.
#[derive(Debug, Clone)]
pub struct EntityCache {
  schema: Arc<Schema>,
  store: EntityStore,
  options: DenormalizeOptions,
}

impl EntityCache {
  pub fn new(schema: Arc<Schema>) -> Self {
    Self {
      schema,
      store: EntityStore::new(),
      options: DenormalizeOptions::default(),
    }
  }

  /// Set the expansion depth used by [`denormalize`](Self::denormalize).
  pub fn with_options(mut self, options: DenormalizeOptions) -> Self {
    self.options = options;
    self
  }

  pub fn schema(&self) -> &Schema {
    &self.schema
  }

  pub fn shared_schema(&self) -> Arc<Schema> {
    Arc::clone(&self.schema)
  }

  pub fn store(&self) -> &EntityStore {
    &self.store
  }

  /// Normalize `raw` against `entity_type` and merge the result.
  ///
  /// Returns the root id (or ids). On error nothing is merged.
  pub fn ingest(&mut self, entity_type: &str, raw: &Value) -> Result<Value, CacheError> {
    let node = self.schema.expect_node(entity_type)?;
    let Normalized { result, entities } = normalize(raw, node)?;
    self.merge_entities(entities);
    Ok(result)
  }

  pub fn merge_entities(&mut self, entities: Entities) {
    let records: usize = entities.values().map(|table| table.len()).sum();
    self.apply(StoreAction::Merge(entities));
    debug!(
      records,
      fingerprint = %self.store.fingerprint(),
      "merged entities"
    );
  }

  /// Remove one record. Returns whether it was present.
  pub fn delete_entity(&mut self, entity_type: &str, id: &str) -> bool {
    let existed = self.store.contains(entity_type, id);
    self.apply(StoreAction::Delete {
      entity_type: entity_type.to_string(),
      id: id.to_string(),
    });
    debug!(
      entity_type,
      id,
      existed,
      fingerprint = %self.store.fingerprint(),
      "deleted entity"
    );
    existed
  }

  fn apply(&mut self, action: StoreAction) {
    self.store.apply(&action);
  }

  /// Nested view of an id or list of ids of `entity_type`.
  pub fn denormalize(&self, entity_type: &str, ids: &Value) -> Result<Option<Value>, CacheError> {
    let node = self.schema.expect_node(entity_type)?;
    Ok(denormalize_with(ids, node, &self.store, self.options))
  }
}
