use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::endpoints::Endpoint;
use crate::cache::CacheError;
use crate::config::ApiConfig;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("no API base_url configured")]
  MissingBaseUrl,

  #[error("invalid API url: {0}")]
  Url(#[from] url::ParseError),

  #[error("API base_url cannot carry a path: {0}")]
  CannotBeABase(Url),

  #[error("{0:?} is not a usable path segment")]
  InvalidSegment(String),

  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("request to {path} failed: {source}")]
  Transport {
    path: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{path} responded with {status}")]
  Status { path: String, status: StatusCode },

  #[error("{path} returned {found} where {expected} was expected")]
  UnexpectedShape {
    path: String,
    expected: &'static str,
    found: &'static str,
  },

  #[error(transparent)]
  Cache(#[from] CacheError),
}

/// Where JSON bodies come from.
///
/// The HTTP implementation talks to the backend; tests substitute an
/// in-memory one.
pub trait ApiTransport: Send + Sync {
  /// GET an endpoint and decode the body as JSON.
  fn get_json(&self, endpoint: &Endpoint) -> impl Future<Output = Result<Value, ApiError>> + Send;

  /// DELETE an endpoint.
  fn delete(&self, endpoint: &Endpoint) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// HTTP/JSON transport.
#[derive(Clone)]
pub struct HttpTransport {
  http: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl HttpTransport {
  pub fn new(config: &ApiConfig, token: Option<String>) -> Result<Self, ApiError> {
    let base = config.base_url.as_deref().ok_or(ApiError::MissingBaseUrl)?;
    let base_url = Self::parse_base_url(base)?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(ApiError::Client)?;

    Ok(Self {
      http,
      base_url,
      token,
    })
  }

  /// Parse the base URL and make sure endpoint segments can be appended.
  fn parse_base_url(base: &str) -> Result<Url, ApiError> {
    let url = Url::parse(base)?;
    if url.cannot_be_a_base() {
      return Err(ApiError::CannotBeABase(url));
    }
    Ok(url)
  }

  fn request(&self, method: Method, endpoint: &Endpoint) -> Result<RequestBuilder, ApiError> {
    let builder = self.http.request(method, endpoint_url(&self.base_url, endpoint)?);
    Ok(match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    })
  }

  async fn send(
    &self,
    method: Method,
    endpoint: &Endpoint,
  ) -> Result<reqwest::Response, ApiError> {
    let path = endpoint.path();
    let response = self
      .request(method, endpoint)?
      .send()
      .await
      .map_err(|source| ApiError::Transport {
        path: path.clone(),
        source,
      })?;

    check_status(&path, response.status())?;
    Ok(response)
  }
}

/// The endpoint's URL under `base_url`.
///
/// Each segment is percent-encoded on its own, so `/`, `?` and `#` inside an
/// id cannot leave the resource path. Segments the URL parser would resolve
/// away (`""`, `"."`, `".."`) are refused.
fn endpoint_url(base_url: &Url, endpoint: &Endpoint) -> Result<Url, ApiError> {
  let segments = endpoint.segments();
  if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
    return Err(ApiError::InvalidSegment(bad.to_string()));
  }

  let mut url = base_url.clone();
  url
    .path_segments_mut()
    .map_err(|_| ApiError::CannotBeABase(base_url.clone()))?
    .pop_if_empty()
    .extend(segments);
  Ok(url)
}

/// Map a non-2xx status to [`ApiError::Status`].
fn check_status(path: &str, status: StatusCode) -> Result<(), ApiError> {
  if status.is_success() {
    Ok(())
  } else {
    Err(ApiError::Status {
      path: path.to_string(),
      status,
    })
  }
}

impl ApiTransport for HttpTransport {
  async fn get_json(&self, endpoint: &Endpoint) -> Result<Value, ApiError> {
    self
      .send(Method::GET, endpoint)
      .await?
      .json::<Value>()
      .await
      .map_err(|source| ApiError::Transport {
        path: endpoint.path(),
        source,
      })
  }

  async fn delete(&self, endpoint: &Endpoint) -> Result<(), ApiError> {
    self.send(Method::DELETE, endpoint).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(base_url: Option<&str>) -> ApiConfig {
    ApiConfig {
      base_url: base_url.map(String::from),
      ..ApiConfig::default()
    }
  }

  #[test]
  fn test_missing_base_url() {
    assert!(matches!(
      HttpTransport::new(&config(None), None),
      Err(ApiError::MissingBaseUrl)
    ));
  }

  #[test]
  fn test_invalid_base_url() {
    assert!(matches!(
      HttpTransport::new(&config(Some("not a url")), None),
      Err(ApiError::Url(_))
    ));
  }

  fn url_for(base: &str, endpoint: &Endpoint) -> Result<Url, ApiError> {
    endpoint_url(&HttpTransport::parse_base_url(base)?, endpoint)
  }

  #[test]
  fn test_paths_join_under_base() {
    for base in ["https://office.example.mil/ghc/v1", "https://office.example.mil/ghc/v1/"] {
      assert_eq!(
        url_for(base, &Endpoint::Move { id: "m1".into() }).unwrap().as_str(),
        "https://office.example.mil/ghc/v1/moves/m1"
      );
      assert_eq!(
        url_for(
          base,
          &Endpoint::MoveShipments {
            move_id: "m1".into()
          }
        )
        .unwrap()
        .as_str(),
        "https://office.example.mil/ghc/v1/moves/m1/mto_shipments"
      );
    }
  }

  #[test]
  fn test_ids_are_escaped_into_one_segment() {
    let base = "https://office.example.mil/ghc/v1";

    let url = url_for(base, &Endpoint::Move { id: "../../admin/users".into() }).unwrap();
    assert_eq!(
      url.as_str(),
      "https://office.example.mil/ghc/v1/moves/..%2F..%2Fadmin%2Fusers"
    );

    let url = url_for(base, &Endpoint::Move { id: "m1?x=1".into() }).unwrap();
    assert_eq!(url.query(), None);
    assert_eq!(url.path(), "/ghc/v1/moves/m1%3Fx=1");

    let url = url_for(base, &Endpoint::Upload { id: "a#b".into() }).unwrap();
    assert_eq!(url.fragment(), None);
    assert_eq!(url.path(), "/ghc/v1/uploads/a%23b");
  }

  #[test]
  fn test_dot_segments_are_refused() {
    let base = "https://office.example.mil/ghc/v1";
    for id in ["..", ".", ""] {
      assert!(matches!(
        url_for(base, &Endpoint::Orders { id: id.into() }),
        Err(ApiError::InvalidSegment(_))
      ));
    }
  }

  #[test]
  fn test_base_url_must_take_a_path() {
    assert!(matches!(
      HttpTransport::parse_base_url("mailto:office@example.mil"),
      Err(ApiError::CannotBeABase(_))
    ));
  }

  #[test]
  fn test_status_mapping() {
    assert!(check_status("moves/m1", StatusCode::OK).is_ok());
    assert!(check_status("uploads/u1", StatusCode::NO_CONTENT).is_ok());

    let err = check_status("moves/m1", StatusCode::UNAUTHORIZED).unwrap_err();
    assert!(matches!(
      &err,
      ApiError::Status { path, status } if path == "moves/m1" && *status == StatusCode::UNAUTHORIZED
    ));
    assert_eq!(err.to_string(), "moves/m1 responded with 401 Unauthorized");
    assert!(matches!(
      check_status("moves/m1", StatusCode::INTERNAL_SERVER_ERROR),
      Err(ApiError::Status { .. })
    ));
  }
}
