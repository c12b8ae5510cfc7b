// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Render sink and the route view handed to it.
//!
//! The core never draws anything itself. It hands the sink an ordered
//! route with the geometry a map needs: padded bounds, a GeoJSON feature
//! collection and an encoded polyline.

use crate::models::{Stop, TransportMode, Trip, Vehicle};
use geo::{BoundingRect, Distance, Haversine, MultiPoint, Point, Rect};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};

/// Fraction of the route extent added on each side of the bounds.
const BOUNDS_PADDING: f64 = 0.1;

/// Polyline precision used by common map renderers.
const POLYLINE_PRECISION: u32 = 5;

/// Receives routes to draw.
pub trait RenderSink: Send + Sync {
    fn draw(&self, view: &RouteView);
    fn clear(&self);
}

/// Sink that draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl RenderSink for NullRenderer {
    fn draw(&self, _view: &RouteView) {}
    fn clear(&self) {}
}

/// Renderable snapshot of a trip.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteView {
    pub name: String,
    pub stops: Vec<Stop>,
    pub mode: TransportMode,
    pub vehicle: Vehicle,
}

impl RouteView {
    pub fn from_trip(trip: &Trip) -> Self {
        Self {
            name: trip.name.clone(),
            stops: trip.stops.clone(),
            mode: trip.mode,
            vehicle: trip.vehicle,
        }
    }

    /// Bounding box of all stops, padded for display.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let points: MultiPoint<f64> = self
            .stops
            .iter()
            .map(|s| Point::from(s.coord()))
            .collect::<Vec<_>>()
            .into();
        let rect = points.bounding_rect()?;
        let (dx, dy) = (
            rect.width() * BOUNDS_PADDING,
            rect.height() * BOUNDS_PADDING,
        );
        Some(Rect::new(
            geo::coord! { x: rect.min().x - dx, y: rect.min().y - dy },
            geo::coord! { x: rect.max().x + dx, y: rect.max().y + dy },
        ))
    }

    /// Great-circle length of the route in kilometres, following stop order.
    pub fn length_km(&self) -> f64 {
        self.stops
            .windows(2)
            .map(|w| Haversine.distance(Point::from(w[0].coord()), Point::from(w[1].coord())))
            .sum::<f64>()
            / 1000.0
    }

    pub fn line_color(&self) -> &'static str {
        match self.vehicle {
            Vehicle::Car => "blue",
            Vehicle::Bicycle => "green",
            Vehicle::Foot => "orange",
        }
    }

    /// Encoded polyline of the route, or `None` for an empty route.
    pub fn polyline(&self) -> Option<String> {
        if self.stops.is_empty() {
            return None;
        }
        polyline::encode_coordinates(self.stops.iter().map(Stop::coord), POLYLINE_PRECISION)
            .map_err(|e| tracing::warn!(error = %e, "Failed to encode route polyline"))
            .ok()
    }

    /// The route as one LineString feature followed by one Point per stop.
    pub fn to_geojson(&self) -> GeoJson {
        let mut features = Vec::with_capacity(self.stops.len() + 1);

        if self.stops.len() > 1 {
            let mut props = JsonObject::new();
            props.insert("name".to_string(), self.name.clone().into());
            props.insert("mode".to_string(), self.mode.as_str().into());
            props.insert("vehicle".to_string(), self.vehicle.as_str().into());
            props.insert("color".to_string(), self.line_color().into());
            props.insert("length_km".to_string(), self.length_km().into());
            features.push(feature(
                Value::LineString(
                    self.stops
                        .iter()
                        .map(|s| vec![s.longitude(), s.latitude()])
                        .collect(),
                ),
                props,
            ));
        }

        for (index, stop) in self.stops.iter().enumerate() {
            let mut props = JsonObject::new();
            props.insert("name".to_string(), stop.label().into());
            props.insert("order".to_string(), (index + 1).into());
            props.insert("vip".to_string(), stop.is_priority().into());
            features.push(feature(
                Value::Point(vec![stop.longitude(), stop.latitude()]),
                props,
            ));
        }

        GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        })
    }
}

fn feature(value: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
