//! User events: fire a named event into the cluster and list the recent
//! ones the local agent has seen.
//!
//! Events travel over gossip, so each agent may hold a different window
//! of recent events and there is no ordering or delivery guarantee.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::kv::base64_bytes;
use crate::api::Endpoint;
use crate::error::{Result, WaypostError};
use crate::transport::Body;

/// A user event as returned by the list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventEntry {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    /// Opaque payload; travels base64-encoded on the wire.
    #[serde(default, with = "base64_bytes")]
    pub payload: Option<Vec<u8>>,
    #[serde(default)]
    pub node_filter: String,
    #[serde(default)]
    pub service_filter: String,
    #[serde(default)]
    pub tag_filter: String,
    #[serde(default)]
    pub version: u64,
    #[serde(rename = "LTime", default)]
    pub l_time: u64,
}

/// Optional scoping filters for a fired event.
#[derive(Debug, Clone, Default)]
pub struct EventFilters {
    pub node: Option<String>,
    pub service: Option<String>,
    pub tag: Option<String>,
}

/// Event endpoint.
#[derive(Clone)]
pub struct Event {
    endpoint: Endpoint,
}

impl Event {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Fires a named event, returning the new event id. The payload is
    /// opaque to the cluster.
    pub async fn fire(
        &self,
        name: &str,
        payload: Option<&[u8]>,
        filters: EventFilters,
    ) -> Result<String> {
        let mut extra: Vec<(&str, &str)> = Vec::new();
        if let Some(node) = &filters.node {
            extra.push(("node", node));
        }
        if let Some(service) = &filters.service {
            extra.push(("service", service));
        }
        if let Some(tag) = &filters.tag {
            extra.push(("tag", tag));
        }

        let body = match payload {
            Some(bytes) => Body::Bytes(bytes.to_vec()),
            None => Body::Empty,
        };

        info!(event = %name, "Firing event");
        let response = self
            .endpoint
            .put(&format!("event/fire/{}", name), &extra, body)
            .await?;
        response
            .get("ID")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| WaypostError::transport("event response carried no id"))
    }

    /// Recent events known by the local agent, optionally filtered by
    /// name.
    pub async fn list(&self, name: Option<&str>) -> Result<Vec<EventEntry>> {
        let extra: Vec<(&str, &str)> = match name {
            Some(name) => vec![("name", name)],
            None => Vec::new(),
        };
        let rows = self.endpoint.get_list("event/list", &extra).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(WaypostError::from))
            .collect()
    }
}
