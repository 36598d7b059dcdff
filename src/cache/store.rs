//! The entity store: per-type tables of records keyed by id.
//!
//! Every transition computes a new state from the old one plus an input, so
//! the same prior state and the same input always produce the same result.
//! Tables are shared copy-on-write; a merge into `uploads` leaves every other
//! table physically shared with the previous state.

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::traits::{Entities, EntityLookup, EntityTable, Record};

/// A single store transition.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreAction {
  /// Insert or wholesale-replace every record in the map.
  Merge(Entities),
  /// Remove one record. Nothing else is touched.
  Delete { entity_type: String, id: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityStore {
  tables: BTreeMap<String, Arc<EntityTable>>,
}

impl EntityStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a state by applying `actions` in order to an empty store.
  pub fn replay<'a>(actions: impl IntoIterator<Item = &'a StoreAction>) -> Self {
    let mut store = Self::new();
    for action in actions {
      store.apply(action);
    }
    store
  }

  /// New state with every incoming record set at its `(type, id)`.
  ///
  /// A record already stored under the same key is replaced in full: fields
  /// present only in the old record are dropped. Types absent from
  /// `entities` keep their tables untouched.
  pub fn merge_entities(&self, entities: &Entities) -> Self {
    let mut next = self.clone();
    next.merge_in_place(entities);
    next
  }

  /// New state without `(entity_type, id)`.
  ///
  /// Records elsewhere that still reference the id are left dangling.
  pub fn delete_entity(&self, entity_type: &str, id: &str) -> Self {
    let mut next = self.clone();
    next.delete_in_place(entity_type, id);
    next
  }

  /// New state after one action.
  pub fn reduce(&self, action: &StoreAction) -> Self {
    let mut next = self.clone();
    next.apply(action);
    next
  }

  /// Apply an action to this state directly.
  ///
  /// Used by the owning cache so a uniquely held table is updated without
  /// being copied. Observable results match [`reduce`](Self::reduce).
  pub fn apply(&mut self, action: &StoreAction) {
    match action {
      StoreAction::Merge(entities) => self.merge_in_place(entities),
      StoreAction::Delete { entity_type, id } => {
        self.delete_in_place(entity_type, id);
      }
    }
  }

  fn merge_in_place(&mut self, entities: &Entities) {
    for (entity_type, incoming) in entities {
      if incoming.is_empty() {
        continue;
      }
      let table = Arc::make_mut(self.tables.entry(entity_type.clone()).or_default());
      for (id, record) in incoming {
        table.insert(id.clone(), record.clone());
      }
    }
  }

  fn delete_in_place(&mut self, entity_type: &str, id: &str) -> bool {
    let Some(table) = self.tables.get_mut(entity_type) else {
      return false;
    };
    if !table.contains_key(id) {
      return false;
    }
    Arc::make_mut(table).remove(id);
    if table.is_empty() {
      self.tables.remove(entity_type);
    }
    true
  }

  pub fn get(&self, entity_type: &str, id: &str) -> Option<&Record> {
    self.record(entity_type, id)
  }

  pub fn contains(&self, entity_type: &str, id: &str) -> bool {
    self.get(entity_type, id).is_some()
  }

  /// Type names with a table, in sorted order.
  pub fn type_names(&self) -> impl Iterator<Item = &str> {
    self.tables.keys().map(String::as_str)
  }

  /// Total number of records across all tables.
  pub fn len(&self) -> usize {
    self.tables.values().map(|table| table.len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Hex SHA-256 digest of every table, id and field in sorted order.
  ///
  /// Equal states have equal fingerprints, which makes replays easy to compare.
  pub fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    for (entity_type, table) in &self.tables {
      if table.is_empty() {
        continue;
      }
      hasher.update(entity_type.as_bytes());
      hasher.update([0x1e]);
      for (id, record) in table.iter() {
        hasher.update(id.as_bytes());
        hasher.update([0x1f]);
        for (field, value) in record {
          hasher.update(field.as_bytes());
          hasher.update([0x1f]);
          hasher.update(value.to_string().as_bytes());
          hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
      }
      hasher.update([0x1d]);
    }
    hex::encode(hasher.finalize())
  }
}

impl EntityLookup for EntityStore {
  fn table(&self, entity_type: &str) -> Option<&EntityTable> {
    self.tables.get(entity_type).map(|table| table.as_ref())
  }
}

impl Serialize for EntityStore {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(
      self
        .tables
        .iter()
        .map(|(entity_type, table)| (entity_type, table.as_ref())),
    )
  }
}
