use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::models::domain::Coordinates;

#[derive(Debug, Error)]
pub enum ZoneDirectoryError {
    #[error("Failed to read zone directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid zone directory: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Zone centroids and neighbor distances for members located by zone only
///
/// ```toml
/// [centroids.riverside]
/// latitude = 40.71
/// longitude = -74.00
///
/// [adjacency.riverside]
/// old-town = 1.5
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneDirectory {
    #[serde(default)]
    pub centroids: BTreeMap<String, Coordinates>,
    #[serde(default)]
    pub adjacency: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ZoneDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ZoneDirectoryError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ZoneDirectoryError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn with_centroid(mut self, zone_id: impl Into<String>, coordinates: Coordinates) -> Self {
        self.centroids.insert(zone_id.into(), coordinates);
        self
    }

    /// Record that two zones border each other at the given distance
    pub fn with_neighbor(
        mut self,
        zone_a: impl Into<String>,
        zone_b: impl Into<String>,
        miles: f64,
    ) -> Self {
        self.adjacency
            .entry(zone_a.into())
            .or_default()
            .insert(zone_b.into(), miles);
        self
    }

    pub fn centroid(&self, zone_id: &str) -> Option<Coordinates> {
        self.centroids.get(zone_id).copied()
    }

    /// Listed distance between two zones, in either direction
    pub fn neighbor_distance(&self, zone_a: &str, zone_b: &str) -> Option<f64> {
        self.adjacency
            .get(zone_a)
            .and_then(|neighbors| neighbors.get(zone_b))
            .or_else(|| {
                self.adjacency
                    .get(zone_b)
                    .and_then(|neighbors| neighbors.get(zone_a))
            })
            .copied()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty() && self.adjacency.is_empty()
    }
}
