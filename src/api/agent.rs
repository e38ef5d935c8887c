//! Local agent operations: cluster membership, checks, and service
//! registration.
//!
//! The agent is the process the client talks to directly. Checks and
//! services registered here are synced to the catalog by the agent's own
//! anti-entropy, so reads from the catalog may briefly disagree.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;

use crate::api::Endpoint;
use crate::error::{Result, WaypostError};
use crate::transport::Body;

/// A member of the cluster gossip pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentMember {
    pub name: String,
    pub addr: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub status: u32,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// A check known to the local agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentCheckInfo {
    #[serde(rename = "CheckID")]
    pub check_id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub notes: String,
    #[serde(rename = "ServiceID", default)]
    pub service_id: String,
}

/// A service known to the local agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceInfo {
    #[serde(rename = "ID")]
    pub id: String,
    pub service: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
}

/// Definition for registering a check with the local agent.
///
/// A check is either script-based or HTTP-based (both need an interval),
/// or TTL-based (the application pushes state through the `ttl_*` calls).
#[derive(Debug, Clone, Default)]
pub struct CheckDefinition {
    pub name: String,
    pub check_id: Option<String>,
    pub notes: Option<String>,
    /// Path to a check script run every `interval`.
    pub script: Option<String>,
    /// URL polled every `interval`; only 2xx counts as healthy.
    pub http: Option<String>,
    /// Check interval in seconds.
    pub interval: Option<u64>,
    /// TTL in seconds for push-style checks.
    pub ttl: Option<u64>,
}

impl CheckDefinition {
    fn validate(&self) -> Result<()> {
        if self.script.is_some() && self.interval.is_none() {
            return Err(WaypostError::validation(
                "a script check requires an interval",
            ));
        }
        if self.script.is_some() && self.ttl.is_some() {
            return Err(WaypostError::validation(
                "script and ttl cannot be combined",
            ));
        }
        if self.http.is_some() && self.interval.is_none() {
            return Err(WaypostError::validation("an http check requires an interval"));
        }
        if self.http.is_some() && self.ttl.is_some() {
            return Err(WaypostError::validation("http and ttl cannot be combined"));
        }
        if self.http.is_some() && self.script.is_some() {
            return Err(WaypostError::validation(
                "script and http cannot be combined",
            ));
        }
        Ok(())
    }

    fn payload(&self) -> serde_json::Value {
        let mut payload = serde_json::Map::new();
        payload.insert("Name".to_string(), json!(self.name));
        if let Some(id) = &self.check_id {
            payload.insert("ID".to_string(), json!(id));
        }
        if let Some(notes) = &self.notes {
            payload.insert("Notes".to_string(), json!(notes));
        }
        if let Some(script) = &self.script {
            payload.insert("Script".to_string(), json!(script));
        }
        if let Some(http) = &self.http {
            payload.insert("HTTP".to_string(), json!(http));
        }
        if let Some(interval) = self.interval {
            payload.insert("Interval".to_string(), json!(format!("{}s", interval)));
        }
        if let Some(ttl) = self.ttl {
            payload.insert("TTL".to_string(), json!(format!("{}s", ttl)));
        }
        serde_json::Value::Object(payload)
    }
}

/// Health-check specification attached to a service registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCheck {
    /// Run a script every `interval` seconds.
    Script { path: String, interval: u64 },
    /// Poll a URL every `interval` seconds.
    Http { url: String, interval: u64 },
    /// Push-style TTL check.
    Ttl { seconds: u64 },
}

impl ServiceCheck {
    fn payload(&self) -> serde_json::Value {
        match self {
            ServiceCheck::Script { path, interval } => json!({
                "script": path,
                "interval": format!("{}s", interval),
            }),
            ServiceCheck::Http { url, interval } => json!({
                "HTTP": url,
                "interval": format!("{}s", interval),
            }),
            ServiceCheck::Ttl { seconds } => json!({
                "TTL": format!("{}s", seconds),
            }),
        }
    }
}

/// Definition for registering a service with the local agent.
#[derive(Debug, Clone, Default)]
pub struct ServiceDefinition {
    pub name: String,
    pub service_id: Option<String>,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub tags: Vec<String>,
    pub check: Option<ServiceCheck>,
}

impl ServiceDefinition {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(WaypostError::validation("service name must not be empty"));
        }
        Ok(())
    }

    fn payload(&self) -> serde_json::Value {
        let mut payload = serde_json::Map::new();
        payload.insert("name".to_string(), json!(self.name));
        if let Some(id) = &self.service_id {
            payload.insert("id".to_string(), json!(id));
        }
        if let Some(address) = &self.address {
            payload.insert("address".to_string(), json!(address));
        }
        if let Some(port) = self.port {
            payload.insert("port".to_string(), json!(port));
        }
        if !self.tags.is_empty() {
            payload.insert("tags".to_string(), json!(self.tags));
        }
        if let Some(check) = &self.check {
            payload.insert("check".to_string(), check.payload());
        }
        serde_json::Value::Object(payload)
    }
}

/// Agent endpoint.
#[derive(Clone)]
pub struct Agent {
    endpoint: Endpoint,
}

impl Agent {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Check management for the local agent.
    pub fn check(&self) -> AgentCheck {
        AgentCheck {
            endpoint: self.endpoint.clone(),
        }
    }

    /// Service registration for the local agent.
    pub fn service(&self) -> AgentService {
        AgentService {
            endpoint: self.endpoint.clone(),
        }
    }

    /// Members of the gossip pool as this agent sees them. Eventually
    /// consistent; the catalog has the strongly consistent view.
    pub async fn members(&self) -> Result<Vec<AgentMember>> {
        let rows = self.endpoint.get_list("agent/members", &[]).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(WaypostError::from))
            .collect()
    }

    /// Checks registered with the local agent, keyed by check id.
    pub async fn checks(&self) -> Result<BTreeMap<String, AgentCheckInfo>> {
        match self.endpoint.get_json("agent/checks", &[]).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Services registered with the local agent, keyed by service id.
    pub async fn services(&self) -> Result<BTreeMap<String, AgentServiceInfo>> {
        match self.endpoint.get_json("agent/services", &[]).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Instructs the agent to join the node at `address`.
    pub async fn join(&self, address: &str, wan: bool) -> Result<()> {
        let extra: &[(&str, &str)] = if wan { &[("wan", "1")] } else { &[] };
        self.endpoint
            .get_raw(&format!("agent/join/{}", address), extra)
            .await?
            .ok_or_else(|| WaypostError::not_found(format!("agent/join/{}", address)))?;
        Ok(())
    }

    /// Forces a failed node into the left state so its entries can be
    /// cleaned up.
    pub async fn force_leave(&self, node: &str) -> Result<()> {
        self.endpoint
            .get_raw(&format!("agent/force-leave/{}", node), &[])
            .await?
            .ok_or_else(|| WaypostError::not_found(format!("agent/force-leave/{}", node)))?;
        Ok(())
    }
}

/// Check sub-endpoint of the agent.
#[derive(Clone)]
pub struct AgentCheck {
    endpoint: Endpoint,
}

impl AgentCheck {
    /// Registers a check with the local agent.
    pub async fn register(&self, check: CheckDefinition) -> Result<()> {
        check.validate()?;
        info!(check = %check.name, "Registering check");
        self.endpoint
            .put("agent/check/register", &[], Body::Json(check.payload()))
            .await?;
        Ok(())
    }

    /// Removes a check from the local agent.
    pub async fn deregister(&self, check_id: &str) -> Result<()> {
        self.endpoint
            .get_raw(&format!("agent/check/deregister/{}", check_id), &[])
            .await?;
        Ok(())
    }

    /// Marks a TTL check passing and resets its clock.
    pub async fn ttl_pass(&self, check_id: &str) -> Result<()> {
        self.ttl_update("pass", check_id).await
    }

    /// Marks a TTL check warning and resets its clock.
    pub async fn ttl_warn(&self, check_id: &str) -> Result<()> {
        self.ttl_update("warn", check_id).await
    }

    /// Marks a TTL check critical and resets its clock.
    pub async fn ttl_fail(&self, check_id: &str) -> Result<()> {
        self.ttl_update("fail", check_id).await
    }

    async fn ttl_update(&self, state: &str, check_id: &str) -> Result<()> {
        self.endpoint
            .get_raw(&format!("agent/check/{}/{}", state, check_id), &[])
            .await?
            .ok_or_else(|| WaypostError::not_found(format!("check {}", check_id)))?;
        Ok(())
    }
}

/// Service sub-endpoint of the agent.
#[derive(Clone)]
pub struct AgentService {
    endpoint: Endpoint,
}

impl AgentService {
    /// Registers a service with the local agent.
    pub async fn register(&self, service: ServiceDefinition) -> Result<()> {
        service.validate()?;
        info!(service = %service.name, "Registering service");
        self.endpoint
            .put("agent/service/register", &[], Body::Json(service.payload()))
            .await?;
        Ok(())
    }

    /// Deregisters a service (and any associated check) from the local
    /// agent.
    pub async fn deregister(&self, service_id: &str) -> Result<()> {
        info!(service_id = %service_id, "Deregistering service");
        self.endpoint
            .get_raw(&format!("agent/service/deregister/{}", service_id), &[])
            .await?;
        Ok(())
    }
}
