//! Normalized entity cache.
//!
//! Nested API responses are flattened into per-type tables keyed by id and
//! rebuilt into nested views on demand:
//! - `schema` declares entity types and the relations between them
//! - `normalizer` turns a nested value into tables plus an id skeleton
//! - `store` holds the tables and merges/deletes records
//! - `denormalizer` rebuilds nested values from ids, cutting cycles
//! - `selectors` answer domain queries on top of the above
//!
//! Relations are stored as plain ids, never as embedded objects, so cyclic
//! schemas need no special handling until a value is rebuilt.

mod denormalizer;
mod layer;
mod normalizer;
mod schema;
pub mod selectors;
mod store;
mod traits;

pub use denormalizer::{denormalize, denormalize_with, DenormalizeOptions};
pub use layer::{CacheError, EntityCache};
pub use normalizer::{normalize, NormalizeError, Normalized};
pub use schema::{
  Cardinality, EntityBuilder, Relation, Schema, SchemaBuilder, SchemaError, SchemaNode,
  DEFAULT_ID_ATTRIBUTE,
};
pub use store::{EntityStore, StoreAction};
pub use traits::{entity_key, Entities, EntityLookup, EntityTable, Record};
