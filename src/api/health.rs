//! Health-check queries against the cluster.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::Endpoint;
use crate::error::{Result, WaypostError};

/// Aggregate state a check can be queried by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Any,
    Unknown,
    Passing,
    Warning,
    Critical,
}

impl CheckState {
    fn as_str(&self) -> &'static str {
        match self {
            CheckState::Any => "any",
            CheckState::Unknown => "unknown",
            CheckState::Passing => "passing",
            CheckState::Warning => "warning",
            CheckState::Critical => "critical",
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CheckState {
    type Err = WaypostError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "any" => Ok(CheckState::Any),
            "unknown" => Ok(CheckState::Unknown),
            "passing" => Ok(CheckState::Passing),
            "warning" => Ok(CheckState::Warning),
            "critical" => Ok(CheckState::Critical),
            other => Err(WaypostError::validation(format!(
                "unknown check state {:?}",
                other
            ))),
        }
    }
}

/// A health-check entry as returned by the health endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheck {
    pub node: String,
    #[serde(rename = "CheckID")]
    pub check_id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub output: String,
    #[serde(rename = "ServiceID", default)]
    pub service_id: String,
    #[serde(default)]
    pub service_name: String,
}

/// A service instance with its node and its current checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceHealth {
    pub node: serde_json::Value,
    pub service: serde_json::Value,
    #[serde(default)]
    pub checks: Vec<HealthCheck>,
}

/// Health endpoint.
#[derive(Clone)]
pub struct Health {
    endpoint: Endpoint,
}

impl Health {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Checks associated with a service across the cluster.
    pub async fn checks(&self, service: &str) -> Result<Vec<HealthCheck>> {
        self.check_rows(&format!("health/checks/{}", service), &[])
            .await
    }

    /// Checks registered on a single node.
    pub async fn node(&self, node: &str) -> Result<Vec<HealthCheck>> {
        self.check_rows(&format!("health/node/{}", node), &[]).await
    }

    /// Nodes providing a service with their check status. With `passing`
    /// set, instances with any non-passing check are filtered out
    /// server-side.
    pub async fn service(
        &self,
        service: &str,
        tag: Option<&str>,
        passing: bool,
    ) -> Result<Vec<ServiceHealth>> {
        let mut extra: Vec<(&str, &str)> = Vec::new();
        if let Some(tag) = tag {
            extra.push(("tag", tag));
        }
        if passing {
            extra.push(("passing", ""));
        }
        let rows = self
            .endpoint
            .get_list(&format!("health/service/{}", service), &extra)
            .await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(WaypostError::from))
            .collect()
    }

    /// All checks in a given state. `CheckState::Any` matches everything.
    pub async fn state(&self, state: CheckState) -> Result<Vec<HealthCheck>> {
        self.check_rows(&format!("health/state/{}", state), &[])
            .await
    }

    async fn check_rows(&self, path: &str, extra: &[(&str, &str)]) -> Result<Vec<HealthCheck>> {
        let rows = self.endpoint.get_list(path, extra).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(WaypostError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_state_parse() {
        assert_eq!("passing".parse::<CheckState>().unwrap(), CheckState::Passing);
        assert_eq!("any".parse::<CheckState>().unwrap(), CheckState::Any);
        assert!("flaky".parse::<CheckState>().is_err());
    }

    #[test]
    fn test_check_state_display() {
        assert_eq!(CheckState::Critical.to_string(), "critical");
    }

    #[test]
    fn test_health_check_deserialization() {
        let row = serde_json::json!({
            "Node": "node-a",
            "CheckID": "service:redis-1",
            "Name": "Service 'redis' check",
            "Status": "passing",
            "ServiceID": "redis-1",
            "ServiceName": "redis",
        });

        let check: HealthCheck = serde_json::from_value(row).unwrap();
        assert_eq!(check.check_id, "service:redis-1");
        assert_eq!(check.status, "passing");
        assert!(check.output.is_empty());
    }
}
