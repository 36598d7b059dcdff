//! The relocation schema graph.
//!
//! Field names follow the API payloads they normalize: the prime/GHC
//! endpoints use camelCase, the older internal endpoints snake_case.

use crate::cache::{Schema, SchemaError};

pub const SERVICE_MEMBERS: &str = "serviceMembers";
pub const ORDERS: &str = "orders";
pub const MOVES: &str = "moves";
pub const SHIPMENTS: &str = "mtoShipments";
pub const SERVICE_ITEMS: &str = "mtoServiceItems";
pub const AGENTS: &str = "mtoAgents";
pub const ADDRESSES: &str = "addresses";
pub const DOCUMENTS: &str = "documents";
pub const UPLOADS: &str = "uploads";
pub const MOVE_DOCUMENTS: &str = "moveDocuments";
pub const INVOICES: &str = "invoices";
pub const LINE_ITEMS: &str = "lineItems";

/// Build the relocation schema.
///
/// Contains the cycles moves → mtoShipments → moves and
/// orders → moves → orders.
pub fn relocation_schema() -> Result<Schema, SchemaError> {
  let mut builder = Schema::builder();

  builder
    .entity(SERVICE_MEMBERS)
    .one("residential_address", ADDRESSES)
    .one("backup_mailing_address", ADDRESSES)
    .many("orders", ORDERS);

  builder
    .entity(ORDERS)
    .one("uploaded_orders", DOCUMENTS)
    .one("uploadedAmendedOrders", DOCUMENTS)
    .many("moves", MOVES);

  builder
    .entity(MOVES)
    .one("orders", ORDERS)
    .many("mtoShipments", SHIPMENTS);

  builder
    .entity(SHIPMENTS)
    .one("moveTaskOrder", MOVES)
    .one("pickupAddress", ADDRESSES)
    .one("secondaryPickupAddress", ADDRESSES)
    .one("destinationAddress", ADDRESSES)
    .one("secondaryDeliveryAddress", ADDRESSES)
    .many("mtoAgents", AGENTS)
    .many("mtoServiceItems", SERVICE_ITEMS);

  builder.entity(SERVICE_ITEMS);
  builder.entity(AGENTS);
  builder.entity(ADDRESSES);

  builder.entity(DOCUMENTS).many("uploads", UPLOADS);
  builder.entity(UPLOADS);
  builder.entity(MOVE_DOCUMENTS).one("document", DOCUMENTS);

  builder.entity(INVOICES).many("line_items", LINE_ITEMS);
  builder.entity(LINE_ITEMS);

  builder.build()
}
