//! Core types and the read-only lookup seam shared by the cache components.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A single entity's own fields. Relationship fields hold ids, never nested objects.
pub type Record = Map<String, Value>;

/// All records of one entity type, keyed by the string form of their id.
pub type EntityTable = BTreeMap<String, Record>;

/// Records grouped by entity type name. Produced by the normalizer and
/// accepted by the store's merge operation.
pub type Entities = BTreeMap<String, EntityTable>;

/// Read access to entity tables.
///
/// Implemented by the [`EntityStore`](super::EntityStore) and by a bare
/// [`Entities`] map, so denormalization and selectors work against either a
/// live store or a freshly normalized response.
pub trait EntityLookup {
  /// The table for an entity type, if any record of that type is known.
  fn table(&self, entity_type: &str) -> Option<&EntityTable>;

  /// A single record by type and id.
  fn record(&self, entity_type: &str, id: &str) -> Option<&Record> {
    self.table(entity_type)?.get(id)
  }
}

impl EntityLookup for Entities {
  fn table(&self, entity_type: &str) -> Option<&EntityTable> {
    self.get(entity_type)
  }
}

/// Table key for an id value.
///
/// Strings and numbers are usable ids; `7` and `"7"` map to the same key.
/// Empty strings, `null`, booleans, arrays and objects are not ids.
pub fn entity_key(id: &Value) -> Option<String> {
  match id {
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}
