//! Flattens nested API responses into per-type entity tables.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::schema::{Cardinality, Relation, SchemaNode};
use super::traits::{entity_key, Entities, Record};

/// Data-integrity failures found while walking a response.
///
/// Any error discards everything extracted so far for that call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
  #[error("{entity_type} at {path} has no usable `{id_attribute}` identity attribute")]
  MissingId {
    entity_type: String,
    id_attribute: String,
    path: String,
  },

  #[error("expected {expected} at {path}, found {found}")]
  UnexpectedShape {
    path: String,
    expected: &'static str,
    found: &'static str,
  },
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normalized {
  /// The root id, or the ordered list of root ids.
  pub result: Value,
  /// Every entity found at any depth, grouped by type.
  pub entities: Entities,
}

/// Normalize an object, or an array of objects, against `node`.
pub fn normalize(raw: &Value, node: SchemaNode<'_>) -> Result<Normalized, NormalizeError> {
  let mut entities = Entities::new();
  let result = match raw {
    Value::Object(_) => visit_entity(raw, node, "$", &mut entities)?,
    Value::Array(items) => Value::Array(
      items
        .iter()
        .enumerate()
        .map(|(i, item)| visit_entity(item, node, &format!("$[{}]", i), &mut entities))
        .collect::<Result<_, _>>()?,
    ),
    other => {
      return Err(unexpected(
        "$",
        "an object or an array of objects",
        other,
      ))
    }
  };

  Ok(Normalized { result, entities })
}

fn visit_entity(
  value: &Value,
  node: SchemaNode<'_>,
  path: &str,
  entities: &mut Entities,
) -> Result<Value, NormalizeError> {
  let Value::Object(object) = value else {
    return Err(unexpected(path, "an object", value));
  };

  let id = object
    .get(node.id_attribute())
    .filter(|id| entity_key(id).is_some())
    .cloned()
    .ok_or_else(|| NormalizeError::MissingId {
      entity_type: node.type_name().to_string(),
      id_attribute: node.id_attribute().to_string(),
      path: path.to_string(),
    })?;
  let key = entity_key(&id).unwrap_or_default();

  let mut record = Record::new();
  for (field, field_value) in object {
    let stored = match node.relation(field) {
      Some(relation) => visit_relation(
        field_value,
        relation,
        node.target(relation),
        &format!("{}.{}", path, field),
        entities,
      )?,
      None => field_value.clone(),
    };
    record.insert(field.clone(), stored);
  }

  // A type/id seen twice in one response: later fields win, earlier ones stay.
  let table = entities.entry(node.type_name().to_string()).or_default();
  match table.get_mut(&key) {
    Some(existing) => existing.extend(record),
    None => {
      table.insert(key, record);
    }
  }

  Ok(id)
}

fn visit_relation(
  value: &Value,
  relation: &Relation,
  target: SchemaNode<'_>,
  path: &str,
  entities: &mut Entities,
) -> Result<Value, NormalizeError> {
  match relation.cardinality() {
    Cardinality::One => visit_reference(value, target, path, entities),
    Cardinality::Many => match value {
      Value::Null => Ok(Value::Null),
      Value::Array(items) => Ok(Value::Array(
        items
          .iter()
          .enumerate()
          .map(|(i, item)| visit_reference(item, target, &format!("{}[{}]", path, i), entities))
          .collect::<Result<_, _>>()?,
      )),
      other => Err(unexpected(path, "an array", other)),
    },
  }
}

/// A nested object is extracted; a bare id or `null` is already normalized.
fn visit_reference(
  value: &Value,
  target: SchemaNode<'_>,
  path: &str,
  entities: &mut Entities,
) -> Result<Value, NormalizeError> {
  match value {
    Value::Object(_) => visit_entity(value, target, path, entities),
    Value::Null => Ok(Value::Null),
    id if entity_key(id).is_some() => Ok(id.clone()),
    other => Err(unexpected(path, "an object or an id", other)),
  }
}

fn unexpected(path: &str, expected: &'static str, found: &Value) -> NormalizeError {
  NormalizeError::UnexpectedShape {
    path: path.to_string(),
    expected,
    found: kind(found),
  }
}

fn kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
