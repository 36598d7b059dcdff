//! Normalized entity cache for relocation case management.
//!
//! API responses (moves containing shipments containing service items, orders
//! referencing documents referencing uploads, ...) are flattened into
//! per-type tables keyed by id and rebuilt into nested views on demand.

pub mod api;
pub mod cache;
pub mod config;
pub mod domain;
pub mod telemetry;
