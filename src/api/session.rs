//! Session lease operations.
//!
//! A session is a server-held lease with an optional TTL. Locks are scoped
//! to a session; destroying the session (or letting its TTL lapse)
//! releases every lock it holds.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::api::Endpoint;
use crate::error::{Result, WaypostError};
use crate::transport::Body;

/// Behavior applied to held locks when a session is invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionBehavior {
    /// Held locks are released; the keys remain.
    #[default]
    Release,
    /// Held keys are deleted. Useful for ephemeral entries.
    Delete,
}

impl SessionBehavior {
    fn as_str(&self) -> &'static str {
        match self {
            SessionBehavior::Release => "release",
            SessionBehavior::Delete => "delete",
        }
    }
}

/// Options for creating a session. All fields are optional; the remote
/// applies its defaults for anything unset.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Human-readable session name.
    pub name: Option<String>,
    /// Lock behavior on invalidation.
    pub behavior: Option<SessionBehavior>,
    /// Node to create the session on; defaults to the local agent's node.
    pub node: Option<String>,
    /// Lock delay in seconds.
    pub lock_delay: Option<u64>,
    /// Time-to-live in seconds. The remote requires 10..=3600 when set.
    pub ttl: Option<u64>,
    /// Associated health checks.
    pub checks: Vec<String>,
}

impl SessionOptions {
    fn validate(&self) -> Result<()> {
        if let Some(ttl) = self.ttl {
            if !(10..=3600).contains(&ttl) {
                return Err(WaypostError::validation(format!(
                    "session TTL must be between 10 and 3600 seconds, got {}",
                    ttl
                )));
            }
        }
        Ok(())
    }

    fn payload(&self) -> serde_json::Value {
        let mut payload = serde_json::Map::new();
        if let Some(name) = &self.name {
            payload.insert("Name".to_string(), json!(name));
        }
        if let Some(behavior) = &self.behavior {
            payload.insert("Behavior".to_string(), json!(behavior.as_str()));
        }
        if let Some(node) = &self.node {
            payload.insert("Node".to_string(), json!(node));
        }
        if let Some(delay) = self.lock_delay {
            payload.insert("LockDelay".to_string(), json!(format!("{}s", delay)));
        }
        if let Some(ttl) = self.ttl {
            payload.insert("TTL".to_string(), json!(format!("{}s", ttl)));
        }
        if !self.checks.is_empty() {
            payload.insert("Checks".to_string(), json!(self.checks));
        }
        serde_json::Value::Object(payload)
    }
}

/// Information about an active session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(rename = "TTL", default)]
    pub ttl: Option<String>,
    #[serde(default)]
    pub behavior: Option<String>,
    #[serde(default)]
    pub create_index: u64,
}

/// Session endpoint.
#[derive(Clone)]
pub struct Session {
    endpoint: Endpoint,
}

impl Session {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Creates a session and returns its id.
    pub async fn create(&self, options: SessionOptions) -> Result<String> {
        options.validate()?;
        let response = self
            .endpoint
            .put("session/create", &[], Body::Json(options.payload()))
            .await?;

        let id = response
            .get("ID")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                WaypostError::transport("session create response missing ID field")
            })?
            .to_string();

        debug!(session = %id, "Created session");
        Ok(id)
    }

    /// Destroys a session, releasing (or deleting) all its locks.
    pub async fn destroy(&self, session_id: &str) -> Result<bool> {
        debug!(session = %session_id, "Destroying session");
        self.endpoint
            .put_bool(
                &format!("session/destroy/{}", session_id),
                &[],
                Body::Empty,
            )
            .await
    }

    /// Renews a TTL session, extending its expiration by the TTL.
    pub async fn renew(&self, session_id: &str) -> Result<Option<SessionInfo>> {
        let rows = self
            .endpoint
            .put(&format!("session/renew/{}", session_id), &[], Body::Empty)
            .await?;
        Self::first_info(rows)
    }

    /// Fetches information about a session.
    pub async fn info(&self, session_id: &str) -> Result<Option<SessionInfo>> {
        let rows = self
            .endpoint
            .get_list(&format!("session/info/{}", session_id), &[])
            .await?;
        Self::first_info(serde_json::Value::Array(rows))
    }

    /// Lists the active sessions in the datacenter.
    pub async fn list(&self) -> Result<Vec<SessionInfo>> {
        let rows = self.endpoint.get_list("session/list", &[]).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(WaypostError::from))
            .collect()
    }

    /// Lists the active sessions for a node.
    pub async fn node(&self, node: &str) -> Result<Vec<SessionInfo>> {
        let rows = self
            .endpoint
            .get_list(&format!("session/node/{}", node), &[])
            .await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(WaypostError::from))
            .collect()
    }

    fn first_info(rows: serde_json::Value) -> Result<Option<SessionInfo>> {
        match rows {
            serde_json::Value::Array(rows) => match rows.into_iter().next() {
                Some(row) => Ok(Some(serde_json::from_value(row)?)),
                None => Ok(None),
            },
            serde_json::Value::Null => Ok(None),
            other => Ok(Some(serde_json::from_value(other)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_payload() {
        let options = SessionOptions {
            name: Some("run-once".to_string()),
            behavior: Some(SessionBehavior::Release),
            ttl: Some(60),
            ..Default::default()
        };

        let payload = options.payload();
        assert_eq!(payload["Name"], "run-once");
        assert_eq!(payload["Behavior"], "release");
        assert_eq!(payload["TTL"], "60s");
        assert!(payload.get("Node").is_none());
        assert!(payload.get("Checks").is_none());
    }

    #[test]
    fn test_empty_options_payload() {
        let payload = SessionOptions::default().payload();
        assert_eq!(payload, serde_json::json!({}));
    }

    #[test]
    fn test_ttl_validation() {
        let options = SessionOptions {
            ttl: Some(5),
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = SessionOptions {
            ttl: Some(3601),
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = SessionOptions {
            ttl: Some(10),
            ..Default::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_session_info_deserialization() {
        let row = serde_json::json!({
            "ID": "adf4238a-882b-9ddc-4a9d-5b6758e4159e",
            "Name": "run-once",
            "Node": "node-a",
            "TTL": "60s",
            "Behavior": "release",
            "CreateIndex": 42,
        });

        let info: SessionInfo = serde_json::from_value(row).unwrap();
        assert_eq!(info.id, "adf4238a-882b-9ddc-4a9d-5b6758e4159e");
        assert_eq!(info.ttl.as_deref(), Some("60s"));
        assert_eq!(info.create_index, 42);
    }
}
