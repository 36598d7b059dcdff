//! HTTP integration boundary: fetches resources and feeds them to the cache.

mod cached_client;
mod client;
mod endpoints;

pub use cached_client::{CachedApiClient, Fetched};
pub use client::{ApiError, ApiTransport, HttpTransport};
pub use endpoints::Endpoint;
