// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geo-tagged stop produced by ingestion or returned by the route service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys the wire format reads as stop fields, including accepted aliases.
const WIRE_KEYS: &[&str] = &[
    "lat",
    "latitude",
    "lng",
    "lon",
    "longitude",
    "name",
    "label",
    "title",
    "vip",
    "is_priority",
];

/// A single stop of a trip. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(rename = "lat", alias = "latitude")]
    latitude: f64,
    #[serde(rename = "lng", alias = "lon", alias = "longitude")]
    longitude: f64,
    #[serde(rename = "name", alias = "label", alias = "title", default)]
    label: String,
    #[serde(rename = "vip", alias = "is_priority", default)]
    is_priority: bool,
    /// Input columns that carry no routing meaning, passed through untouched
    #[serde(flatten, default)]
    metadata: Map<String, Value>,
}

impl Stop {
    pub fn new(latitude: f64, longitude: f64, label: impl Into<String>, is_priority: bool) -> Self {
        Self {
            latitude,
            longitude,
            label: label.into(),
            is_priority,
            metadata: Map::new(),
        }
    }

    /// Attach pass-through columns. Keys that would collide with a stop
    /// field on the wire are dropped.
    pub fn with_metadata(mut self, mut metadata: Map<String, Value>) -> Self {
        metadata.retain(|key, _| !Self::is_wire_key(key));
        self.metadata = metadata;
        self
    }

    pub fn is_wire_key(key: &str) -> bool {
        WIRE_KEYS.contains(&key)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_priority(&self) -> bool {
        self.is_priority
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// `(x, y)` ordering as used by geo types.
    pub fn coord(&self) -> geo::Coord<f64> {
        geo::coord! { x: self.longitude, y: self.latitude }
    }
}
