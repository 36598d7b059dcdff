//! Rebuilds nested values from ids by walking the schema graph.
//!
//! Missing entities are expected during partial loads and are never errors:
//! a missing root id yields `None`, a missing list entry yields `null`, and a
//! missing single reference leaves the field out of the output object.
//!
//! Cycles are cut per call. While an entity is being expanded, any relation
//! inside it that leads back to the same `(type, id)` yields the stored id
//! instead of a nested object. Only ancestors on the current path count, so
//! two siblings that point at the same entity are both expanded in full.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

use super::schema::{Cardinality, Relation, SchemaNode};
use super::traits::{entity_key, EntityLookup, Record};

/// Controls how far relations are expanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DenormalizeOptions {
  /// Relations nested deeper than this many levels stay as ids.
  /// `Some(0)` returns the root record unexpanded; `None` expands fully.
  pub max_depth: Option<usize>,
}

/// Denormalize a single id (`None` when absent) or an array of ids
/// (`Some(array)`, with `null` for each absent entry).
pub fn denormalize<L>(input: &Value, node: SchemaNode<'_>, store: &L) -> Option<Value>
where
  L: EntityLookup + ?Sized,
{
  denormalize_with(input, node, store, DenormalizeOptions::default())
}

/// [`denormalize`] with an explicit expansion depth.
pub fn denormalize_with<L>(
  input: &Value,
  node: SchemaNode<'_>,
  store: &L,
  options: DenormalizeOptions,
) -> Option<Value>
where
  L: EntityLookup + ?Sized,
{
  let mut walker = Walker {
    store,
    options,
    expanding: HashSet::new(),
  };

  match input {
    Value::Array(ids) => Some(Value::Array(
      ids
        .iter()
        .map(|id| walker.entity(id, node, 0).unwrap_or(Value::Null))
        .collect(),
    )),
    id => walker.entity(id, node, 0),
  }
}

struct Walker<'s, L: ?Sized> {
  store: &'s L,
  options: DenormalizeOptions,
  expanding: HashSet<(String, String)>,
}

impl<L: EntityLookup + ?Sized> Walker<'_, L> {
  fn entity(&mut self, id: &Value, node: SchemaNode<'_>, depth: usize) -> Option<Value> {
    let key = entity_key(id)?;
    let store = self.store;
    let record = store.record(node.type_name(), &key)?;

    if !self.may_expand(depth) {
      return Some(Value::Object(record.clone()));
    }

    let marker = (node.type_name().to_string(), key);
    self.expanding.insert(marker.clone());

    let mut output = Record::new();
    for (field, value) in record {
      match node.relation(field) {
        Some(relation) => {
          if let Some(expanded) = self.relation(value, relation, node.target(relation), depth + 1)
          {
            output.insert(field.clone(), expanded);
          }
        }
        None => {
          output.insert(field.clone(), value.clone());
        }
      }
    }

    self.expanding.remove(&marker);
    Some(Value::Object(output))
  }

  fn relation(
    &mut self,
    value: &Value,
    relation: &Relation,
    target: SchemaNode<'_>,
    depth: usize,
  ) -> Option<Value> {
    match (relation.cardinality(), value) {
      (_, Value::Null) => Some(Value::Null),
      (Cardinality::One, id) => self.reference(id, target, depth),
      (Cardinality::Many, Value::Array(ids)) => Some(Value::Array(
        ids
          .iter()
          .map(|id| self.reference(id, target, depth).unwrap_or(Value::Null))
          .collect(),
      )),
      // Stored data that does not match the schema is passed through as-is.
      (Cardinality::Many, other) => Some(other.clone()),
    }
  }

  fn reference(&mut self, id: &Value, target: SchemaNode<'_>, depth: usize) -> Option<Value> {
    if let Some(key) = entity_key(id) {
      if self
        .expanding
        .contains(&(target.type_name().to_string(), key))
      {
        return Some(id.clone());
      }
    }
    self.entity(id, target, depth)
  }

  fn may_expand(&self, depth: usize) -> bool {
    self.options.max_depth.map_or(true, |max| depth < max)
  }
}
