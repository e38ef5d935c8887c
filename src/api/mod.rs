//! Typed endpoint facades over the remote v1 API.
//!
//! [`Client`] owns the transport plus the datacenter/token scope and hands
//! out per-resource endpoints. The endpoints hold no local state; every
//! operation is a single request/response cycle against the remote agent.

pub mod acl;
pub mod agent;
pub mod catalog;
pub mod coordinate;
pub mod event;
pub mod health;
pub mod kv;
pub mod lock;
pub mod session;
pub mod status;

#[cfg(test)]
mod lock_tests;

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::transport::{Body, HttpTransport, Query, Transport};

pub use acl::Acl;
pub use agent::Agent;
pub use catalog::Catalog;
pub use coordinate::Coordinate;
pub use event::Event;
pub use health::Health;
pub use kv::Kv;
pub use lock::Lock;
pub use session::Session;
pub use status::Status;

/// Shared request plumbing: transport plus the datacenter/token scope
/// appended to every request's query string.
#[derive(Clone)]
pub(crate) struct Endpoint {
    transport: Arc<dyn Transport>,
    datacenter: Option<String>,
    token: Option<String>,
}

impl Endpoint {
    /// Builds the query list, appending configured `dc` and `token`.
    fn query(&self, extra: &[(&str, &str)]) -> Query {
        let mut query: Query = extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some(dc) = &self.datacenter {
            query.push(("dc".to_string(), dc.clone()));
        }
        if let Some(token) = &self.token {
            query.push(("token".to_string(), token.clone()));
        }
        query
    }

    pub(crate) async fn get_json(
        &self,
        path: &str,
        extra: &[(&str, &str)],
    ) -> Result<Option<serde_json::Value>> {
        self.transport.get_json(path, &self.query(extra)).await
    }

    pub(crate) async fn get_raw(
        &self,
        path: &str,
        extra: &[(&str, &str)],
    ) -> Result<Option<Vec<u8>>> {
        self.transport.get_raw(path, &self.query(extra)).await
    }

    /// GET that decodes the response as a list; an absent resource is an
    /// empty list, and a lone object is wrapped.
    pub(crate) async fn get_list(
        &self,
        path: &str,
        extra: &[(&str, &str)],
    ) -> Result<Vec<serde_json::Value>> {
        match self.get_json(path, extra).await? {
            None => Ok(Vec::new()),
            Some(serde_json::Value::Array(rows)) => Ok(rows),
            Some(other) => Ok(vec![other]),
        }
    }

    pub(crate) async fn put(
        &self,
        path: &str,
        extra: &[(&str, &str)],
        body: Body,
    ) -> Result<serde_json::Value> {
        self.transport.put(path, &self.query(extra), body).await
    }

    /// PUT whose response body is the remote's boolean verdict.
    pub(crate) async fn put_bool(
        &self,
        path: &str,
        extra: &[(&str, &str)],
        body: Body,
    ) -> Result<bool> {
        let value = self.put(path, extra, body).await?;
        Ok(value.as_bool().unwrap_or(true))
    }

    pub(crate) async fn delete(&self, path: &str, extra: &[(&str, &str)]) -> Result<bool> {
        self.transport.delete(path, &self.query(extra)).await
    }
}

/// Client for the remote service-discovery and KV coordination agent.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> waypost::Result<()> {
/// use waypost::{Client, ClientConfig, Value};
///
/// let client = Client::new(&ClientConfig::default())?;
/// client.kv().set("release_flag", Value::Bool(true)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    endpoint: Endpoint,
}

impl Client {
    /// Creates a client over an HTTP transport built from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config)?);
        Ok(Self::with_transport(
            transport,
            config.datacenter.clone(),
            config.token.clone(),
        ))
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        datacenter: Option<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            endpoint: Endpoint {
                transport,
                datacenter,
                token,
            },
        }
    }

    /// Key/value namespace view.
    pub fn kv(&self) -> Kv {
        Kv::new(self.endpoint.clone())
    }

    /// Session lease operations.
    pub fn session(&self) -> Session {
        Session::new(self.endpoint.clone())
    }

    /// Advisory-lock primitive over KV sessions.
    pub fn lock(&self) -> Lock {
        Lock::new(self.endpoint.clone())
    }

    /// Local agent operations: members, checks, service registration.
    pub fn agent(&self) -> Agent {
        Agent::new(self.endpoint.clone())
    }

    /// Catalog reads and low-level registration.
    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.endpoint.clone())
    }

    /// Health-check queries.
    pub fn health(&self) -> Health {
        Health::new(self.endpoint.clone())
    }

    /// Network coordinate queries and RTT estimation.
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.endpoint.clone())
    }

    /// User events: fire and list.
    pub fn event(&self) -> Event {
        Event::new(self.endpoint.clone())
    }

    /// ACL token management.
    pub fn acl(&self) -> Acl {
        Acl::new(self.endpoint.clone())
    }

    /// Cluster status (leader, peers).
    pub fn status(&self) -> Status {
        Status::new(self.endpoint.clone())
    }
}
