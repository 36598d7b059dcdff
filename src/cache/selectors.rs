//! Domain queries over the entity store.
//!
//! Forward lookups go straight through the denormalizer. Reverse lookups
//! ("every shipment of move X") scan the child table for a foreign-key field.
//! All selectors accept an empty store and return empty results.

use serde_json::Value;
use std::cmp::Ordering;

use super::denormalizer::denormalize;
use super::schema::{Schema, SchemaNode};
use super::traits::{entity_key, EntityLookup, Record};
use crate::domain::{
  DOCUMENTS, INVOICES, LINE_ITEMS, MOVES, MOVE_DOCUMENTS, ORDERS, SERVICE_ITEMS, SHIPMENTS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortOrder {
  Ascending,
  Descending,
}

/// Every record of `node`'s type whose `field` equals `value`, denormalized,
/// in id order. Ids compare by string form, so `7` matches `"7"`.
pub fn select_where<L>(store: &L, node: SchemaNode<'_>, field: &str, value: &Value) -> Vec<Value>
where
  L: EntityLookup + ?Sized,
{
  let Some(table) = store.table(node.type_name()) else {
    return Vec::new();
  };

  table
    .iter()
    .filter(|(_, record)| field_matches(record, field, value))
    .filter_map(|(id, _)| denormalize(&Value::String(id.clone()), node, store))
    .collect()
}

/// The fully nested move.
pub fn select_move<L>(store: &L, schema: &Schema, move_id: &str) -> Option<Value>
where
  L: EntityLookup + ?Sized,
{
  let node = schema.node(MOVES)?;
  denormalize(&Value::String(move_id.to_string()), node, store)
}

/// The orders a move belongs to.
///
/// Uses the move's own reference when it has one, otherwise the first orders
/// record (in id order) that lists the move.
pub fn select_orders_for_move<L>(store: &L, schema: &Schema, move_id: &str) -> Option<Value>
where
  L: EntityLookup + ?Sized,
{
  let orders = schema.node(ORDERS)?;

  if let Some(record) = store.record(MOVES, move_id) {
    let referenced = ["orders", "ordersId", "orders_id"]
      .iter()
      .filter_map(|field| record.get(*field))
      .find(|id| entity_key(id).is_some());
    if let Some(found) = referenced.and_then(|id| denormalize(id, orders, store)) {
      return Some(found);
    }
  }

  let (orders_id, _) = store.table(ORDERS)?.iter().find(|(_, record)| {
    record
      .get("moves")
      .and_then(Value::as_array)
      .is_some_and(|ids| ids.iter().any(|id| same_id(id, move_id)))
  })?;
  denormalize(&Value::String(orders_id.clone()), orders, store)
}

/// Shipments of a move, oldest first.
pub fn select_shipments_for_move<L>(store: &L, schema: &Schema, move_id: &str) -> Vec<Value>
where
  L: EntityLookup + ?Sized,
{
  let Some(node) = schema.node(SHIPMENTS) else {
    return Vec::new();
  };
  let mut shipments = select_where(store, node, "moveTaskOrderID", &id_value(move_id));
  sort_by_field(&mut shipments, "createdAt", SortOrder::Ascending);
  shipments
}

/// Service items attached to a shipment, oldest first.
pub fn select_service_items_for_shipment<L>(
  store: &L,
  schema: &Schema,
  shipment_id: &str,
) -> Vec<Value>
where
  L: EntityLookup + ?Sized,
{
  let Some(node) = schema.node(SERVICE_ITEMS) else {
    return Vec::new();
  };
  let mut items = select_where(store, node, "mtoShipmentID", &id_value(shipment_id));
  sort_by_field(&mut items, "createdAt", SortOrder::Ascending);
  items
}

/// Move documents of a move with their documents and uploads, oldest first.
pub fn select_move_documents<L>(store: &L, schema: &Schema, move_id: &str) -> Vec<Value>
where
  L: EntityLookup + ?Sized,
{
  let Some(node) = schema.node(MOVE_DOCUMENTS) else {
    return Vec::new();
  };
  let mut documents = select_where(store, node, "move_id", &id_value(move_id));
  sort_by_field(&mut documents, "created_at", SortOrder::Ascending);
  documents
}

/// [`select_move_documents`] restricted to one `move_document_type`.
pub fn select_move_documents_by_type<L>(
  store: &L,
  schema: &Schema,
  move_id: &str,
  document_type: &str,
) -> Vec<Value>
where
  L: EntityLookup + ?Sized,
{
  select_move_documents(store, schema, move_id)
    .into_iter()
    .filter(|doc| doc.get("move_document_type").and_then(Value::as_str) == Some(document_type))
    .collect()
}

/// Uploads of a document in the order the document lists them.
/// Uploads that are no longer stored are left out.
pub fn select_uploads_for_document<L>(store: &L, schema: &Schema, document_id: &str) -> Vec<Value>
where
  L: EntityLookup + ?Sized,
{
  let Some(node) = schema.node(DOCUMENTS) else {
    return Vec::new();
  };
  let document = denormalize(&Value::String(document_id.to_string()), node, store);

  match document.as_ref().and_then(|doc| doc.get("uploads")) {
    Some(Value::Array(uploads)) => uploads
      .iter()
      .filter(|upload| upload.is_object())
      .cloned()
      .collect(),
    _ => Vec::new(),
  }
}

/// Invoices of a shipment with their line items, newest first.
pub fn select_invoices_for_shipment<L>(store: &L, schema: &Schema, shipment_id: &str) -> Vec<Value>
where
  L: EntityLookup + ?Sized,
{
  let Some(node) = schema.node(INVOICES) else {
    return Vec::new();
  };
  let mut invoices = select_where(store, node, "shipment_id", &id_value(shipment_id));
  sort_by_field(&mut invoices, "invoiced_date", SortOrder::Descending);
  invoices
}

/// Sum of `amount_cents` over every line item invoiced for a shipment.
///
/// `None` when the sum does not fit in an `i64`.
pub fn select_total_invoiced<L>(store: &L, shipment_id: &str) -> Option<i64>
where
  L: EntityLookup + ?Sized,
{
  let Some(invoices) = store.table(INVOICES) else {
    return Some(0);
  };

  invoices
    .values()
    .filter(|invoice| field_matches(invoice, "shipment_id", &id_value(shipment_id)))
    .filter_map(|invoice| invoice.get("line_items").and_then(Value::as_array))
    .flatten()
    .filter_map(entity_key)
    .filter_map(|id| store.record(LINE_ITEMS, &id))
    .filter_map(|item| item.get("amount_cents").and_then(Value::as_i64))
    .try_fold(0i64, |total, amount| total.checked_add(amount))
}

fn id_value(id: &str) -> Value {
  Value::String(id.to_string())
}

fn field_matches(record: &Record, field: &str, value: &Value) -> bool {
  match (record.get(field), entity_key(value)) {
    (Some(found), Some(key)) => same_id(found, &key),
    (Some(found), None) => found == value,
    (None, _) => false,
  }
}

fn same_id(candidate: &Value, key: &str) -> bool {
  entity_key(candidate).as_deref() == Some(key)
}

/// Stable sort on a scalar field; ties keep their incoming (id) order.
fn sort_by_field(items: &mut [Value], field: &str, order: SortOrder) {
  items.sort_by(|a, b| {
    let ordering = compare_field(a.get(field), b.get(field));
    match order {
      SortOrder::Ascending => ordering,
      SortOrder::Descending => ordering.reverse(),
    }
  });
}

/// Numbers compare numerically; everything else by string form, with a
/// missing or non-scalar value first.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
  match (a, b) {
    (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
      (Some(x), Some(y)) => x.cmp(&y),
      _ => x
        .as_f64()
        .partial_cmp(&y.as_f64())
        .unwrap_or(Ordering::Equal),
    },
    _ => sort_key(a).cmp(&sort_key(b)),
  }
}

fn sort_key(value: Option<&Value>) -> String {
  value.and_then(entity_key).unwrap_or_default()
}
