//! Endpoints whose responses feed the entity cache.

use std::fmt;

use crate::domain::{
  DOCUMENTS, INVOICES, MOVES, MOVE_DOCUMENTS, ORDERS, SERVICE_MEMBERS, SHIPMENTS, UPLOADS,
};

/// An API resource, and the entity type its JSON body normalizes against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
  /// A move with its orders and shipments
  Move { id: String },
  /// All shipments of a move
  MoveShipments { move_id: String },
  /// Orders with their uploaded documents
  Orders { id: String },
  /// A document with its uploads
  Document { id: String },
  /// Move documents attached to a move
  MoveDocuments { move_id: String },
  /// Invoices billed against a shipment
  ShipmentInvoices { shipment_id: String },
  /// A service member with addresses and orders
  ServiceMember { id: String },
  /// A single upload (used for deletion)
  Upload { id: String },
}

impl Endpoint {
  /// Path segments relative to the API base URL. Ids are single segments,
  /// whatever characters they contain.
  pub fn segments(&self) -> Vec<&str> {
    match self {
      Self::Move { id } => vec!["moves", id.as_str()],
      Self::MoveShipments { move_id } => vec!["moves", move_id.as_str(), "mto_shipments"],
      Self::Orders { id } => vec!["orders", id.as_str()],
      Self::Document { id } => vec!["documents", id.as_str()],
      Self::MoveDocuments { move_id } => vec!["moves", move_id.as_str(), "move_documents"],
      Self::ShipmentInvoices { shipment_id } => {
        vec!["shipments", shipment_id.as_str(), "invoices"]
      }
      Self::ServiceMember { id } => vec!["service_members", id.as_str()],
      Self::Upload { id } => vec!["uploads", id.as_str()],
    }
  }

  /// Unescaped request path, for logs and error messages.
  pub fn path(&self) -> String {
    self.segments().join("/")
  }

  /// Entity type the response body is normalized against.
  pub fn entity_type(&self) -> &'static str {
    match self {
      Self::Move { .. } => MOVES,
      Self::MoveShipments { .. } => SHIPMENTS,
      Self::Orders { .. } => ORDERS,
      Self::Document { .. } => DOCUMENTS,
      Self::MoveDocuments { .. } => MOVE_DOCUMENTS,
      Self::ShipmentInvoices { .. } => INVOICES,
      Self::ServiceMember { .. } => SERVICE_MEMBERS,
      Self::Upload { .. } => UPLOADS,
    }
  }

  /// Whether the response body is a list rather than a single object.
  pub fn is_collection(&self) -> bool {
    matches!(
      self,
      Self::MoveShipments { .. } | Self::MoveDocuments { .. } | Self::ShipmentInvoices { .. }
    )
  }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Move { id } => write!(f, "move {}", id),
      Self::MoveShipments { move_id } => write!(f, "shipments of move {}", move_id),
      Self::Orders { id } => write!(f, "orders {}", id),
      Self::Document { id } => write!(f, "document {}", id),
      Self::MoveDocuments { move_id } => write!(f, "move documents of move {}", move_id),
      Self::ShipmentInvoices { shipment_id } => {
        write!(f, "invoices of shipment {}", shipment_id)
      }
      Self::ServiceMember { id } => write!(f, "service member {}", id),
      Self::Upload { id } => write!(f, "upload {}", id),
    }
  }
}
