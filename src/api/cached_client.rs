//! API client that feeds every response into the entity cache.

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::{normalize, CacheError, EntityCache, EntityStore, Schema};
use crate::config::Config;
use crate::domain::UPLOADS;

use super::client::{ApiError, ApiTransport, HttpTransport};
use super::endpoints::Endpoint;

/// A response that has been merged into the cache.
#[derive(Debug, Clone)]
pub struct Fetched {
  pub endpoint: Endpoint,
  /// Root id (or ids) of the response, as returned by the normalizer.
  pub result: Value,
  pub fetched_at: DateTime<Utc>,
}

/// Wraps a transport and the application's [`EntityCache`].
///
/// Responses are normalized outside the lock and merged under it, one
/// response at a time, in the order they resolve. Dropping an in-flight
/// call never merges anything.
pub struct CachedApiClient<T: ApiTransport> {
  transport: T,
  schema: Arc<Schema>,
  cache: Arc<Mutex<EntityCache>>,
}

impl CachedApiClient<HttpTransport> {
  /// Create an HTTP-backed client from configuration.
  pub fn from_config(config: &Config, cache: EntityCache) -> Result<Self, ApiError> {
    let transport = HttpTransport::new(&config.api, Config::get_api_token())?;
    Ok(Self::new(transport, cache))
  }
}

impl<T: ApiTransport> CachedApiClient<T> {
  pub fn new(transport: T, cache: EntityCache) -> Self {
    Self {
      transport,
      schema: cache.shared_schema(),
      cache: Arc::new(Mutex::new(cache)),
    }
  }

  /// GET an endpoint, normalize the body and merge it.
  ///
  /// A body that is not the list or object the endpoint returns, or that
  /// cannot be normalized, is discarded; the store is unchanged.
  pub async fn fetch(&self, endpoint: &Endpoint) -> Result<Fetched, ApiError> {
    let path = endpoint.path();
    info!(%endpoint, %path, "fetching");
    let raw = self.transport.get_json(endpoint).await?;
    check_shape(endpoint, &raw)?;

    let node = self
      .schema
      .expect_node(endpoint.entity_type())
      .map_err(CacheError::from)?;
    let normalized = normalize(&raw, node).map_err(|err| {
      warn!(%endpoint, error = %err, "discarding response");
      CacheError::from(err)
    })?;

    self.cache.lock().await.merge_entities(normalized.entities);

    Ok(Fetched {
      endpoint: endpoint.clone(),
      result: normalized.result,
      fetched_at: Utc::now(),
    })
  }

  /// Fetch several endpoints concurrently.
  ///
  /// Each response is merged as soon as it resolves, so when two responses
  /// carry the same record the later arrival wins. Results are returned in
  /// the order of `endpoints`.
  pub async fn fetch_all(&self, endpoints: &[Endpoint]) -> Vec<Result<Fetched, ApiError>> {
    let mut pending: FuturesUnordered<_> = endpoints
      .iter()
      .enumerate()
      .map(|(position, endpoint)| async move { (position, self.fetch(endpoint).await) })
      .collect();

    let mut results: Vec<Option<Result<Fetched, ApiError>>> =
      std::iter::repeat_with(|| None).take(endpoints.len()).collect();
    while let Some((position, result)) = pending.next().await {
      results[position] = Some(result);
    }

    results.into_iter().flatten().collect()
  }

  /// Delete an upload on the server, then drop it from the cache.
  ///
  /// Documents that list the upload keep the dangling id.
  pub async fn delete_upload(&self, id: &str) -> Result<bool, ApiError> {
    let endpoint = Endpoint::Upload { id: id.to_string() };
    info!(%endpoint, "deleting");
    self.transport.delete(&endpoint).await?;
    Ok(self.cache.lock().await.delete_entity(UPLOADS, id))
  }

  /// Nested view of a fetched result against the current store.
  pub async fn denormalize(&self, fetched: &Fetched) -> Result<Option<Value>, ApiError> {
    let cache = self.cache.lock().await;
    Ok(cache.denormalize(fetched.endpoint.entity_type(), &fetched.result)?)
  }

  /// Run a read against the cache while holding the lock.
  pub async fn read<R>(&self, f: impl FnOnce(&EntityCache) -> R) -> R {
    let cache = self.cache.lock().await;
    f(&cache)
  }

  /// A copy of the current store.
  pub async fn snapshot(&self) -> EntityStore {
    self.cache.lock().await.store().clone()
  }
}

fn check_shape(endpoint: &Endpoint, raw: &Value) -> Result<(), ApiError> {
  let expected = if endpoint.is_collection() {
    "an array"
  } else {
    "an object"
  };
  let found = match raw {
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
  };
  if expected == found {
    return Ok(());
  }

  warn!(%endpoint, expected, found, "discarding response");
  Err(ApiError::UnexpectedShape {
    path: endpoint.path(),
    expected,
    found,
  })
}

impl<T: ApiTransport + Clone> Clone for CachedApiClient<T> {
  fn clone(&self) -> Self {
    Self {
      transport: self.transport.clone(),
      schema: Arc::clone(&self.schema),
      cache: Arc::clone(&self.cache),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::selectors::select_uploads_for_document;
  use crate::domain::{relocation_schema, SHIPMENTS};
  use reqwest::StatusCode;
  use serde_json::json;
  use std::collections::HashMap;
  use std::time::Duration;

  #[derive(Default)]
  struct FakeTransport {
    responses: HashMap<String, Value>,
    delays: HashMap<String, Duration>,
    deleted: std::sync::Mutex<Vec<String>>,
  }

  impl FakeTransport {
    fn respond(mut self, path: &str, body: Value) -> Self {
      self.responses.insert(path.to_string(), body);
      self
    }

    fn delay(mut self, path: &str, delay: Duration) -> Self {
      self.delays.insert(path.to_string(), delay);
      self
    }
  }

  impl ApiTransport for FakeTransport {
    async fn get_json(&self, endpoint: &Endpoint) -> Result<Value, ApiError> {
      let path = endpoint.path();
      if let Some(delay) = self.delays.get(&path) {
        tokio::time::sleep(*delay).await;
      }
      self.responses.get(&path).cloned().ok_or(ApiError::Status {
        path,
        status: StatusCode::NOT_FOUND,
      })
    }

    async fn delete(&self, endpoint: &Endpoint) -> Result<(), ApiError> {
      self.deleted.lock().unwrap().push(endpoint.path());
      Ok(())
    }
  }

  fn client(transport: FakeTransport) -> CachedApiClient<FakeTransport> {
    let cache = EntityCache::new(Arc::new(relocation_schema().unwrap()));
    CachedApiClient::new(transport, cache)
  }

  #[tokio::test]
  async fn test_fetch_merges_and_denormalizes() {
    let body = json!({
      "id": "m1",
      "locator": "ABC123",
      "mtoShipments": [{"id": "s1", "shipmentType": "HHG"}, {"id": "s2", "shipmentType": "NTS"}]
    });
    let client = client(FakeTransport::default().respond("moves/m1", body.clone()));

    let fetched = client.fetch(&Endpoint::Move { id: "m1".into() }).await.unwrap();

    assert_eq!(fetched.result, json!("m1"));
    assert_eq!(client.snapshot().await.len(), 3);
    assert_eq!(client.denormalize(&fetched).await.unwrap(), Some(body));
  }

  #[tokio::test]
  async fn test_bad_body_leaves_store_untouched() {
    let client = client(
      FakeTransport::default()
        .respond("moves/m1", json!({"id": "m1"}))
        .respond("moves/m2", json!({"id": "m2", "mtoShipments": [{"shipmentType": "HHG"}]})),
    );
    client.fetch(&Endpoint::Move { id: "m1".into() }).await.unwrap();
    let before = client.snapshot().await;

    let err = client
      .fetch(&Endpoint::Move { id: "m2".into() })
      .await
      .unwrap_err();

    assert!(matches!(err, ApiError::Cache(CacheError::Normalize(_))));
    assert_eq!(client.snapshot().await, before);
  }

  #[tokio::test]
  async fn test_response_shape_must_match_endpoint() {
    let shipments = Endpoint::MoveShipments {
      move_id: "m1".into(),
    };
    let client = client(
      FakeTransport::default()
        .respond(&shipments.path(), json!({"id": "s1", "shipmentType": "HHG"}))
        .respond("moves/m1", json!([{"id": "m1"}])),
    );

    let err = client.fetch(&shipments).await.unwrap_err();
    assert!(matches!(
      err,
      ApiError::UnexpectedShape { expected: "an array", found: "an object", .. }
    ));

    let err = client
      .fetch(&Endpoint::Move { id: "m1".into() })
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      ApiError::UnexpectedShape { expected: "an object", found: "an array", .. }
    ));
    assert!(client.snapshot().await.is_empty());
  }

  #[tokio::test]
  async fn test_transport_error_is_surfaced() {
    let client = client(FakeTransport::default());
    let err = client
      .fetch(&Endpoint::Orders { id: "o1".into() })
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::Status { status, .. } if status == StatusCode::NOT_FOUND));
    assert!(client.snapshot().await.is_empty());
  }

  #[tokio::test]
  async fn test_fetch_all_returns_results_in_request_order() {
    let slow = Endpoint::MoveShipments {
      move_id: "m1".into(),
    };
    let fast = Endpoint::ShipmentInvoices {
      shipment_id: "s1".into(),
    };
    let client = client(
      FakeTransport::default()
        .respond(
          &slow.path(),
          json!([{"id": "s1", "status": "APPROVED"}]),
        )
        .delay(&slow.path(), Duration::from_millis(50))
        .respond(
          &fast.path(),
          json!([{"id": "i1", "shipment_id": "s1", "line_items": []}]),
        ),
    );

    let results = client.fetch_all(&[slow.clone(), fast.clone()]).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().endpoint, slow);
    assert_eq!(results[1].as_ref().unwrap().endpoint, fast);
    let store = client.snapshot().await;
    assert!(store.contains(SHIPMENTS, "s1"));
    assert!(store.contains("invoices", "i1"));
  }

  #[tokio::test]
  async fn test_later_arrival_wins() {
    let first = Endpoint::Move { id: "m1".into() };
    let second = Endpoint::MoveShipments {
      move_id: "m1".into(),
    };
    let client = client(
      FakeTransport::default()
        .respond(
          &first.path(),
          json!({"id": "m1", "mtoShipments": [{"id": "s1", "status": "SUBMITTED"}]}),
        )
        .delay(&first.path(), Duration::from_millis(50))
        .respond(&second.path(), json!([{"id": "s1", "status": "APPROVED"}])),
    );

    let results = client.fetch_all(&[first, second]).await;
    assert!(results.iter().all(Result::is_ok));

    let store = client.snapshot().await;
    assert_eq!(store.get(SHIPMENTS, "s1").unwrap()["status"], json!("SUBMITTED"));
  }

  #[tokio::test]
  async fn test_delete_upload_is_local() {
    let transport = FakeTransport::default().respond(
      "documents/d1",
      json!({"id": "d1", "uploads": [{"id": "u1"}, {"id": "u2"}]}),
    );
    let client = client(transport);
    client
      .fetch(&Endpoint::Document { id: "d1".into() })
      .await
      .unwrap();

    assert!(client.delete_upload("u1").await.unwrap());

    let store = client.snapshot().await;
    assert!(!store.contains(UPLOADS, "u1"));
    assert_eq!(
      store.get("documents", "d1").unwrap()["uploads"],
      json!(["u1", "u2"])
    );
    let uploads = client
      .read(|cache| select_uploads_for_document(cache.store(), cache.schema(), "d1"))
      .await;
    assert_eq!(uploads, vec![json!({"id": "u2"})]);
    assert_eq!(
      *client.transport.deleted.lock().unwrap(),
      vec!["uploads/u1".to_string()]
    );
  }
}
