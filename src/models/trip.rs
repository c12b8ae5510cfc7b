// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trip and history models.

use super::Stop;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Server-assigned trip identifier. The remote store may send it as a
/// string or a number; it is always handled as a string locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TripId(String);

impl TripId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TripId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => TripId(s),
            Raw::Number(n) => TripId(n.to_string()),
        })
    }
}

/// Optimisation goal passed to the route service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    #[default]
    Baseline,
    Fastest,
    Shortest,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Baseline => "baseline",
            TransportMode::Fastest => "fastest",
            TransportMode::Shortest => "shortest",
        }
    }
}

impl std::str::FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" => Ok(TransportMode::Baseline),
            "fastest" => Ok(TransportMode::Fastest),
            "shortest" => Ok(TransportMode::Shortest),
            other => Err(format!("unknown route mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vehicle {
    #[default]
    Car,
    Bicycle,
    Foot,
}

impl Vehicle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vehicle::Car => "car",
            Vehicle::Bicycle => "bicycle",
            Vehicle::Foot => "foot",
        }
    }
}

impl std::str::FromStr for Vehicle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(Vehicle::Car),
            "bicycle" | "bike" => Ok(Vehicle::Bicycle),
            "foot" | "walk" => Ok(Vehicle::Foot),
            other => Err(format!("unknown vehicle: {}", other)),
        }
    }
}

/// A trip: an ordered stop list plus routing parameters.
///
/// The identifier is absent until the first successful save; once present,
/// saving again updates the stored trip instead of creating a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TripId>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "points", alias = "trip", alias = "stops", default)]
    pub stops: Vec<Stop>,
    #[serde(default)]
    pub mode: TransportMode,
    #[serde(default)]
    pub vehicle: Vehicle,
}

impl Trip {
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

/// A saved trip as listed by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub trip: Trip,
    #[serde(
        rename = "date",
        alias = "saved_at",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub saved_at: Option<DateTime<Utc>>,
}

impl HistoryEntry {
    /// Identifier of the stored trip. Entries without one are never kept.
    pub fn id(&self) -> Option<&TripId> {
        self.trip.id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.trip.name
    }
}
