//! Declarative schema graph.
//!
//! A [`Schema`] names every entity type, its identity attribute, and which of
//! its fields point at other entity types. Relations target types by name, so
//! cyclic graphs (A relates to B, B relates to A) are declared in any order and
//! resolved once by [`SchemaBuilder::build`].

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Identity attribute used when a type does not declare its own.
pub const DEFAULT_ID_ATTRIBUTE: &str = "id";

/// Schema configuration errors. All of them surface from
/// [`SchemaBuilder::build`], before any data is processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
  #[error("entity type `{0}` is defined more than once")]
  DuplicateEntity(String),

  #[error("entity type `{entity_type}` relates `{field}` to undefined type `{target}`")]
  UndefinedEntity {
    entity_type: String,
    field: String,
    target: String,
  },

  #[error("entity type `{entity_type}` relates `{field}` more than once")]
  DuplicateField { entity_type: String, field: String },

  #[error("entity type `{entity_type}` cannot relate its identity attribute `{field}`")]
  RelationOnIdentity { entity_type: String, field: String },

  #[error("unknown entity type `{0}`")]
  UnknownEntity(String),
}

/// Whether a relation holds a single entity or an ordered list of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
  One,
  Many,
}

/// A resolved relationship field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
  field: String,
  cardinality: Cardinality,
  target: usize,
}

impl Relation {
  pub fn field(&self) -> &str {
    &self.field
  }

  pub fn cardinality(&self) -> Cardinality {
    self.cardinality
  }
}

#[derive(Debug)]
struct EntityDef {
  name: String,
  id_attribute: String,
  relations: Vec<Relation>,
}

/// An immutable, validated schema graph.
#[derive(Debug)]
pub struct Schema {
  entities: Vec<EntityDef>,
  index: HashMap<String, usize>,
}

impl Schema {
  pub fn builder() -> SchemaBuilder {
    SchemaBuilder::default()
  }

  /// Look up the node for an entity type.
  pub fn node(&self, type_name: &str) -> Option<SchemaNode<'_>> {
    self
      .index
      .get(type_name)
      .map(|&index| SchemaNode { schema: self, index })
  }

  /// Like [`Schema::node`], but an unknown type is an error.
  pub fn expect_node(&self, type_name: &str) -> Result<SchemaNode<'_>, SchemaError> {
    self
      .node(type_name)
      .ok_or_else(|| SchemaError::UnknownEntity(type_name.to_string()))
  }

  /// All nodes in declaration order.
  pub fn nodes(&self) -> impl Iterator<Item = SchemaNode<'_>> {
    (0..self.entities.len()).map(move |index| SchemaNode {
      schema: self,
      index,
    })
  }
}

impl fmt::Display for Schema {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for node in self.nodes() {
      writeln!(f, "{} (identity: {})", node.type_name(), node.id_attribute())?;
      for relation in node.relations() {
        let target = node.target(relation).type_name();
        match relation.cardinality() {
          Cardinality::One => writeln!(f, "  {} -> {}", relation.field(), target)?,
          Cardinality::Many => writeln!(f, "  {} -> [{}]", relation.field(), target)?,
        }
      }
    }
    Ok(())
  }
}

/// A handle to one entity type inside a [`Schema`].
#[derive(Clone, Copy)]
pub struct SchemaNode<'a> {
  schema: &'a Schema,
  index: usize,
}

impl<'a> SchemaNode<'a> {
  fn def(&self) -> &'a EntityDef {
    &self.schema.entities[self.index]
  }

  pub fn type_name(&self) -> &'a str {
    &self.def().name
  }

  pub fn id_attribute(&self) -> &'a str {
    &self.def().id_attribute
  }

  /// The relation declared on `field`, or `None` for a plain field.
  pub fn relation(&self, field: &str) -> Option<&'a Relation> {
    self.def().relations.iter().find(|r| r.field == field)
  }

  /// Relations in declaration order.
  pub fn relations(&self) -> impl Iterator<Item = &'a Relation> {
    self.def().relations.iter()
  }

  /// The node a relation of this type points at.
  pub fn target(&self, relation: &Relation) -> SchemaNode<'a> {
    SchemaNode {
      schema: self.schema,
      index: relation.target,
    }
  }

  pub fn schema(&self) -> &'a Schema {
    self.schema
  }
}

impl fmt::Debug for SchemaNode<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("SchemaNode").field(&self.type_name()).finish()
  }
}

impl PartialEq for SchemaNode<'_> {
  fn eq(&self, other: &Self) -> bool {
    std::ptr::eq(self.schema, other.schema) && self.index == other.index
  }
}

impl Eq for SchemaNode<'_> {}

#[derive(Debug)]
struct PendingEntity {
  name: String,
  id_attribute: String,
  relations: Vec<(String, Cardinality, String)>,
}

/// Collects entity declarations; nothing is checked until [`build`](Self::build).
#[derive(Debug, Default)]
pub struct SchemaBuilder {
  pending: Vec<PendingEntity>,
}

impl SchemaBuilder {
  /// Declare an entity type. Declaring the same name twice fails the build.
  pub fn entity(&mut self, type_name: &str) -> EntityBuilder<'_> {
    self.pending.push(PendingEntity {
      name: type_name.to_string(),
      id_attribute: DEFAULT_ID_ATTRIBUTE.to_string(),
      relations: Vec::new(),
    });
    let last = self.pending.len() - 1;
    EntityBuilder {
      entity: &mut self.pending[last],
    }
  }

  /// Resolve every relation target and validate the graph.
  pub fn build(self) -> Result<Schema, SchemaError> {
    let mut index = HashMap::with_capacity(self.pending.len());
    for (position, entity) in self.pending.iter().enumerate() {
      if index.insert(entity.name.clone(), position).is_some() {
        return Err(SchemaError::DuplicateEntity(entity.name.clone()));
      }
    }

    let mut entities = Vec::with_capacity(self.pending.len());
    for entity in self.pending {
      let mut relations: Vec<Relation> = Vec::with_capacity(entity.relations.len());
      for (field, cardinality, target) in entity.relations {
        if field == entity.id_attribute {
          return Err(SchemaError::RelationOnIdentity {
            entity_type: entity.name,
            field,
          });
        }
        if relations.iter().any(|r| r.field == field) {
          return Err(SchemaError::DuplicateField {
            entity_type: entity.name,
            field,
          });
        }
        let Some(&target_index) = index.get(&target) else {
          return Err(SchemaError::UndefinedEntity {
            entity_type: entity.name,
            field,
            target,
          });
        };
        relations.push(Relation {
          field,
          cardinality,
          target: target_index,
        });
      }
      entities.push(EntityDef {
        name: entity.name,
        id_attribute: entity.id_attribute,
        relations,
      });
    }

    Ok(Schema { entities, index })
  }
}

/// Declares the identity attribute and relations of one entity type.
pub struct EntityBuilder<'b> {
  entity: &'b mut PendingEntity,
}

impl EntityBuilder<'_> {
  pub fn id_attribute(self, attribute: &str) -> Self {
    self.entity.id_attribute = attribute.to_string();
    self
  }

  /// `field` holds a single entity of type `target`.
  pub fn one(self, field: &str, target: &str) -> Self {
    self.relate(field, Cardinality::One, target)
  }

  /// `field` holds an ordered list of entities of type `target`.
  pub fn many(self, field: &str, target: &str) -> Self {
    self.relate(field, Cardinality::Many, target)
  }

  pub fn relate(self, field: &str, cardinality: Cardinality, target: &str) -> Self {
    self
      .entity
      .relations
      .push((field.to_string(), cardinality, target.to_string()));
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn move_schema() -> Schema {
    let mut builder = Schema::builder();
    // Forward reference: shipments are declared after moves.
    builder.entity("moves").many("shipments", "shipments");
    builder.entity("shipments").one("move", "moves");
    builder.build().unwrap()
  }

  #[test]
  fn test_cyclic_graph_resolves() {
    let schema = move_schema();
    let moves = schema.node("moves").unwrap();
    let relation = moves.relation("shipments").unwrap();
    assert_eq!(relation.cardinality(), Cardinality::Many);

    let shipments = moves.target(relation);
    assert_eq!(shipments.type_name(), "shipments");

    let back = shipments.target(shipments.relation("move").unwrap());
    assert_eq!(back, moves);
  }

  #[test]
  fn test_default_and_custom_identity() {
    let mut builder = Schema::builder();
    builder.entity("moves");
    builder.entity("uploads").id_attribute("upload_id");
    let schema = builder.build().unwrap();

    assert_eq!(schema.node("moves").unwrap().id_attribute(), "id");
    assert_eq!(schema.node("uploads").unwrap().id_attribute(), "upload_id");
  }

  #[test]
  fn test_duplicate_entity_is_rejected() {
    let mut builder = Schema::builder();
    builder.entity("moves");
    builder.entity("moves");
    assert_eq!(
      builder.build().unwrap_err(),
      SchemaError::DuplicateEntity("moves".into())
    );
  }

  #[test]
  fn test_undefined_target_is_rejected() {
    let mut builder = Schema::builder();
    builder.entity("moves").one("orders", "orders");
    assert_eq!(
      builder.build().unwrap_err(),
      SchemaError::UndefinedEntity {
        entity_type: "moves".into(),
        field: "orders".into(),
        target: "orders".into(),
      }
    );
  }

  #[test]
  fn test_duplicate_field_is_rejected() {
    let mut builder = Schema::builder();
    builder
      .entity("moves")
      .one("orders", "moves")
      .many("orders", "moves");
    assert!(matches!(
      builder.build(),
      Err(SchemaError::DuplicateField { .. })
    ));
  }

  #[test]
  fn test_relation_on_identity_is_rejected() {
    let mut builder = Schema::builder();
    builder.entity("moves").one("id", "moves");
    assert!(matches!(
      builder.build(),
      Err(SchemaError::RelationOnIdentity { .. })
    ));
  }

  #[test]
  fn test_unknown_node_lookup() {
    let schema = move_schema();
    assert!(schema.node("invoices").is_none());
    assert_eq!(
      schema.expect_node("invoices").unwrap_err(),
      SchemaError::UnknownEntity("invoices".into())
    );
  }

  #[test]
  fn test_display_lists_relations() {
    let rendered = move_schema().to_string();
    assert!(rendered.contains("moves (identity: id)"));
    assert!(rendered.contains("  shipments -> [shipments]"));
    assert!(rendered.contains("  move -> moves"));
  }
}
