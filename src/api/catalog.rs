//! Catalog reads and low-level node registration.
//!
//! The catalog is the strongly consistent registry maintained by the
//! servers. Registration through the local agent is usually preferred;
//! direct catalog writes bypass the agent's anti-entropy and are meant
//! for external entities such as hosts not running an agent.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;

use crate::api::Endpoint;
use crate::error::{Result, WaypostError};
use crate::transport::Body;

/// A node entry in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogNode {
    pub node: String,
    pub address: String,
}

/// A service instance attached to a catalog node registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogService {
    #[serde(rename = "ID", default)]
    pub id: String,
    pub service: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub port: u16,
}

/// A node that provides a given service, as returned by service lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceNode {
    pub node: String,
    pub address: String,
    #[serde(rename = "ServiceID", default)]
    pub service_id: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub service_tags: Option<Vec<String>>,
    #[serde(default)]
    pub service_address: String,
    #[serde(default)]
    pub service_port: u16,
}

/// Node detail: the node itself plus its services keyed by service id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeDetail {
    pub node: CatalogNode,
    #[serde(default)]
    pub services: BTreeMap<String, CatalogService>,
}

/// Catalog endpoint.
#[derive(Clone)]
pub struct Catalog {
    endpoint: Endpoint,
}

impl Catalog {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Registers a node, optionally with a service and a check, directly
    /// in the catalog.
    pub async fn register(
        &self,
        node: &str,
        address: &str,
        service: Option<CatalogService>,
        check: Option<serde_json::Value>,
    ) -> Result<bool> {
        let mut payload = serde_json::Map::new();
        payload.insert("Node".to_string(), json!(node));
        payload.insert("Address".to_string(), json!(address));
        if let Some(service) = service {
            payload.insert("Service".to_string(), serde_json::to_value(service)?);
        }
        if let Some(check) = check {
            payload.insert("Check".to_string(), check);
        }
        info!(node = %node, "Registering catalog entry");
        self.endpoint
            .put_bool(
                "catalog/register",
                &[],
                Body::Json(serde_json::Value::Object(payload)),
            )
            .await
    }

    /// Removes a node, or a single check or service on it, from the
    /// catalog. With neither id given the whole node is deregistered.
    pub async fn deregister(
        &self,
        node: &str,
        check_id: Option<&str>,
        service_id: Option<&str>,
    ) -> Result<bool> {
        let mut payload = serde_json::Map::new();
        payload.insert("Node".to_string(), json!(node));
        if let Some(check_id) = check_id {
            payload.insert("CheckID".to_string(), json!(check_id));
        }
        if let Some(service_id) = service_id {
            payload.insert("ServiceID".to_string(), json!(service_id));
        }
        info!(node = %node, "Deregistering catalog entry");
        self.endpoint
            .put_bool(
                "catalog/deregister",
                &[],
                Body::Json(serde_json::Value::Object(payload)),
            )
            .await
    }

    /// Known datacenters.
    pub async fn datacenters(&self) -> Result<Vec<String>> {
        match self.endpoint.get_json("catalog/datacenters", &[]).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// All nodes registered in the catalog.
    pub async fn nodes(&self) -> Result<Vec<CatalogNode>> {
        let rows = self.endpoint.get_list("catalog/nodes", &[]).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(WaypostError::from))
            .collect()
    }

    /// A single node and its services, or `None` if it is not registered.
    pub async fn node(&self, name: &str) -> Result<Option<NodeDetail>> {
        match self
            .endpoint
            .get_json(&format!("catalog/node/{}", name), &[])
            .await?
        {
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// All services in the catalog, as a map of service name to tags.
    pub async fn services(&self) -> Result<BTreeMap<String, Vec<String>>> {
        match self.endpoint.get_json("catalog/services", &[]).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeMap::new()),
        }
    }

    /// The nodes providing a service.
    pub async fn service(&self, name: &str) -> Result<Vec<ServiceNode>> {
        let rows = self
            .endpoint
            .get_list(&format!("catalog/service/{}", name), &[])
            .await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(WaypostError::from))
            .collect()
    }
}
