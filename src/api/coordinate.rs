//! Network coordinate queries and client-side RTT estimation.
//!
//! The cluster maintains Vivaldi network coordinates for its members.
//! Coordinates are only comparable within one datacenter; estimating RTT
//! across datacenters with these inputs produces garbage.

use serde::{Deserialize, Serialize};

use crate::api::Endpoint;
use crate::error::{Result, WaypostError};

/// A Vivaldi coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Coord {
    /// Position in the coordinate space, in seconds per axis.
    pub vec: Vec<f64>,
    #[serde(default)]
    pub error: f64,
    #[serde(default)]
    pub adjustment: f64,
    #[serde(default)]
    pub height: f64,
}

/// A node paired with its coordinate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeCoordinate {
    pub node: String,
    pub coord: Coord,
}

/// Estimated round-trip time between two coordinates, in milliseconds.
///
/// Euclidean distance in the coordinate space plus both heights, with the
/// latency adjustments applied when they do not drive the estimate
/// negative.
pub fn rtt(a: &Coord, b: &Coord) -> Result<f64> {
    if a.vec.len() != b.vec.len() {
        return Err(WaypostError::validation(format!(
            "coordinate dimensionality mismatch: {} vs {}",
            a.vec.len(),
            b.vec.len()
        )));
    }

    let sum_sq: f64 = a
        .vec
        .iter()
        .zip(&b.vec)
        .map(|(x, y)| (x - y) * (x - y))
        .sum();
    let mut estimate = sum_sq.sqrt() + a.height + b.height;

    let adjusted = estimate + a.adjustment + b.adjustment;
    if adjusted > 0.0 {
        estimate = adjusted;
    }

    Ok(estimate * 1000.0)
}

/// Coordinate endpoint.
#[derive(Clone)]
pub struct Coordinate {
    endpoint: Endpoint,
}

impl Coordinate {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Coordinates of all nodes in the datacenter.
    pub async fn nodes(&self) -> Result<Vec<NodeCoordinate>> {
        let rows = self.endpoint.get_list("coordinate/nodes", &[]).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(WaypostError::from))
            .collect()
    }

    /// Coordinate of a single node, or `None` when the node has no
    /// coordinate yet.
    pub async fn node(&self, name: &str) -> Result<Option<NodeCoordinate>> {
        let rows = self
            .endpoint
            .get_list(&format!("coordinate/node/{}", name), &[])
            .await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    /// Server coordinates grouped by area, as reported by the datacenter
    /// summary endpoint.
    pub async fn datacenters(&self) -> Result<Vec<serde_json::Value>> {
        self.endpoint.get_list("coordinate/datacenters", &[]).await
    }
}
