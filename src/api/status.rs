//! Cluster status: current leader and raft peers.

use crate::api::Endpoint;
use crate::error::{Result, WaypostError};

/// Status endpoint.
#[derive(Clone)]
pub struct Status {
    endpoint: Endpoint,
}

impl Status {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Address of the current raft leader, as `host:port`. An empty
    /// string means the cluster has no leader right now.
    pub async fn leader(&self) -> Result<String> {
        match self.endpoint.get_json("status/leader", &[]).await? {
            Some(serde_json::Value::String(addr)) => Ok(addr),
            Some(other) => Err(WaypostError::transport(format!(
                "unexpected leader response: {}",
                other
            ))),
            None => Err(WaypostError::not_found("status/leader")),
        }
    }

    /// Addresses of the raft peers participating in leader election.
    pub async fn peers(&self) -> Result<Vec<String>> {
        match self.endpoint.get_json("status/peers", &[]).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }
}
