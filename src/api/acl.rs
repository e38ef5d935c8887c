//! ACL token management.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::info;

use crate::api::Endpoint;
use crate::error::{Result, WaypostError};
use crate::transport::Body;

/// Token type: client tokens are scoped by their rules, management
/// tokens can do everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AclType {
    #[default]
    Client,
    Management,
}

impl AclType {
    fn as_str(&self) -> &'static str {
        match self {
            AclType::Client => "client",
            AclType::Management => "management",
        }
    }
}

impl fmt::Display for AclType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ACL entry as returned by info and list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AclEntry {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "Type", default)]
    pub acl_type: String,
    #[serde(default)]
    pub rules: String,
    #[serde(default)]
    pub create_index: u64,
    #[serde(default)]
    pub modify_index: u64,
}

/// ACL endpoint. All operations require a management token in the
/// client scope.
#[derive(Clone)]
pub struct Acl {
    endpoint: Endpoint,
}

impl Acl {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Creates a token and returns its id.
    pub async fn create(
        &self,
        name: &str,
        acl_type: AclType,
        rules: Option<&str>,
    ) -> Result<String> {
        let mut payload = serde_json::Map::new();
        payload.insert("Name".to_string(), json!(name));
        payload.insert("Type".to_string(), json!(acl_type.as_str()));
        if let Some(rules) = rules {
            payload.insert("Rules".to_string(), json!(rules));
        }
        info!(name = %name, acl_type = %acl_type, "Creating ACL token");
        let response = self
            .endpoint
            .put("acl/create", &[], Body::Json(serde_json::Value::Object(payload)))
            .await?;
        Self::token_id(response)
    }

    /// Clones an existing token and returns the new id.
    pub async fn clone_token(&self, acl_id: &str) -> Result<String> {
        let response = self
            .endpoint
            .put(&format!("acl/clone/{}", acl_id), &[], Body::Empty)
            .await?;
        Self::token_id(response)
    }

    /// Updates a token in place; creates it when the id does not exist.
    pub async fn update(
        &self,
        acl_id: &str,
        name: &str,
        acl_type: AclType,
        rules: Option<&str>,
    ) -> Result<bool> {
        let mut payload = serde_json::Map::new();
        payload.insert("ID".to_string(), json!(acl_id));
        payload.insert("Name".to_string(), json!(name));
        payload.insert("Type".to_string(), json!(acl_type.as_str()));
        if let Some(rules) = rules {
            payload.insert("Rules".to_string(), json!(rules));
        }
        info!(acl_id = %acl_id, "Updating ACL token");
        self.endpoint
            .put_bool("acl/update", &[], Body::Json(serde_json::Value::Object(payload)))
            .await
    }

    /// Destroys a token.
    pub async fn destroy(&self, acl_id: &str) -> Result<bool> {
        info!(acl_id = %acl_id, "Destroying ACL token");
        self.endpoint
            .put_bool(&format!("acl/destroy/{}", acl_id), &[], Body::Empty)
            .await
    }

    /// Detail for a single token, or `None` when it does not exist.
    pub async fn info(&self, acl_id: &str) -> Result<Option<AclEntry>> {
        let rows = self
            .endpoint
            .get_list(&format!("acl/info/{}", acl_id), &[])
            .await?;
        match rows.into_iter().next() {
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
        }
    }

    /// All tokens.
    pub async fn list(&self) -> Result<Vec<AclEntry>> {
        let rows = self.endpoint.get_list("acl/list", &[]).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(WaypostError::from))
            .collect()
    }

    fn token_id(response: serde_json::Value) -> Result<String> {
        response
            .get("ID")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| WaypostError::transport("ACL response carried no token id"))
    }
}
