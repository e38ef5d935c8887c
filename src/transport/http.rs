//! reqwest-based transport implementation.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::{Result, WaypostError};
use crate::transport::{Body, Query, Transport};

/// HTTP transport over a configured base URI.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_uri: String,
}

impl HttpTransport {
    /// Creates a transport from connection configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Self::with_timeout(config.base_uri(), config.timeout())
    }

    /// Creates a transport with an explicit base URI and request timeout.
    pub fn with_timeout(base_uri: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            WaypostError::transport_with_source("Failed to create HTTP client", e)
        })?;

        Ok(Self {
            client,
            base_uri: base_uri.into(),
        })
    }

    /// Builds the full request URL for a path and query.
    fn url(&self, path: &str, query: &Query) -> String {
        let mut url = format!("{}/{}", self.base_uri, path);
        if !query.is_empty() {
            let params: Vec<String> = query
                .iter()
                .map(|(k, v)| {
                    if v.is_empty() {
                        k.clone()
                    } else {
                        format!("{}={}", k, urlencode(v))
                    }
                })
                .collect();
            url = format!("{}?{}", url, params.join("&"));
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Body,
    ) -> Result<reqwest::Response> {
        let url = self.url(path, query);
        trace!(method = %method, url = %redact_token(&url), "Sending request");

        let mut request = self.client.request(method, &url);
        request = match body {
            Body::Empty => request,
            Body::Bytes(bytes) => request.body(bytes),
            Body::Json(value) => request.json(&value),
        };

        request
            .send()
            .await
            .map_err(|e| WaypostError::transport_with_source(format!("request to {}", url), e))
    }

    /// Maps a non-2xx, non-404 status to the error taxonomy.
    async fn status_error(path: &str, response: reqwest::Response) -> WaypostError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => WaypostError::permission(format!(
                "{}: {}",
                path,
                if body.is_empty() {
                    status.to_string()
                } else {
                    body
                }
            )),
            StatusCode::CONFLICT => WaypostError::conflict(format!("{}: {}", path, body)),
            _ => WaypostError::transport(format!("{} returned {}: {}", path, status, body)),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, path: &str, query: &Query) -> Result<Option<serde_json::Value>> {
        let response = self.send(Method::GET, path, query, Body::Empty).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value = response.json().await.map_err(|e| {
                    WaypostError::transport_with_source(
                        format!("Failed to decode response from {}", path),
                        e,
                    )
                })?;
                Ok(Some(value))
            }
            _ => Err(Self::status_error(path, response).await),
        }
    }

    async fn get_raw(&self, path: &str, query: &Query) -> Result<Option<Vec<u8>>> {
        let response = self.send(Method::GET, path, query, Body::Empty).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response.bytes().await.map_err(|e| {
                    WaypostError::transport_with_source(
                        format!("Failed to read response from {}", path),
                        e,
                    )
                })?;
                Ok(Some(bytes.to_vec()))
            }
            _ => Err(Self::status_error(path, response).await),
        }
    }

    async fn put(&self, path: &str, query: &Query, body: Body) -> Result<serde_json::Value> {
        let response = self.send(Method::PUT, path, query, body).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(WaypostError::not_found(path.to_string()));
        }
        if !status.is_success() {
            return Err(Self::status_error(path, response).await);
        }

        let text = response.text().await.map_err(|e| {
            WaypostError::transport_with_source(format!("Failed to read response from {}", path), e)
        })?;

        debug!(path = %path, status = %status, "PUT completed");
        Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::Null))
    }

    async fn delete(&self, path: &str, query: &Query) -> Result<bool> {
        let response = self.send(Method::DELETE, path, query, Body::Empty).await?;
        let status = response.status();

        match status {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(Self::status_error(path, response).await),
        }
    }
}

/// Masks the ACL token parameter so logged URLs never carry the
/// credential.
fn redact_token(url: &str) -> String {
    let Some(sep) = url.find('?') else {
        return url.to_string();
    };
    let (base, query) = url.split_at(sep + 1);
    let params: Vec<&str> = query
        .split('&')
        .map(|param| {
            if param.starts_with("token=") {
                "token=REDACTED"
            } else {
                param
            }
        })
        .collect();
    format!("{}{}", base, params.join("&"))
}

/// Percent-encodes a query parameter value.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
