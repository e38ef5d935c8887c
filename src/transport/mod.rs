//! HTTP transport for the remote agent API.
//!
//! The [`Transport`] trait is the seam between the typed endpoints and the
//! wire: it issues `GET`/`PUT`/`DELETE` requests against the configured
//! base URI and returns decoded JSON or raw bytes. A 404 on `GET` means
//! "absent" and is surfaced as `None`, not an error.

pub mod http;

#[cfg(test)]
pub mod memory;

pub use http::HttpTransport;

use async_trait::async_trait;

use crate::error::Result;

/// Request body for `PUT` requests.
#[derive(Debug, Clone)]
pub enum Body {
    /// No body.
    Empty,
    /// Raw bytes, sent as-is.
    Bytes(Vec<u8>),
    /// A JSON document.
    Json(serde_json::Value),
}

/// A query parameter list. Parameters with an empty value are rendered
/// as bare keys (`?recurse` rather than `?recurse=`).
pub type Query = Vec<(String, String)>;

/// Request/response transport against the remote agent.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a `GET` and decodes the response as JSON.
    /// Returns `Ok(None)` when the resource is absent (404).
    async fn get_json(&self, path: &str, query: &Query) -> Result<Option<serde_json::Value>>;

    /// Performs a `GET` and returns the raw response body.
    /// Returns `Ok(None)` when the resource is absent (404).
    async fn get_raw(&self, path: &str, query: &Query) -> Result<Option<Vec<u8>>>;

    /// Performs a `PUT` and decodes the response as JSON where possible.
    /// Non-JSON 2xx bodies decode to `serde_json::Value::Null`.
    async fn put(&self, path: &str, query: &Query, body: Body) -> Result<serde_json::Value>;

    /// Performs a `DELETE`. Returns whether the remote reported success.
    async fn delete(&self, path: &str, query: &Query) -> Result<bool>;
}
