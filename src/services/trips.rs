// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trip state manager.
//!
//! Owns the one current trip. Every mutation goes through `&mut self`, so a
//! caller cannot run two route builds against the same trip at once.

use crate::error::{NetworkError, RouteError, SaveError, ValidationError};
use crate::models::{HistoryEntry, Stop, TransportMode, Trip, Vehicle};
use crate::services::api::ApiClient;
use crate::services::ingest::{self, RawTable};
use crate::services::notify::{NoticeLevel, NotificationSink};
use crate::services::render::{RenderSink, RouteView};
use chrono::{DateTime, Utc};
use std::io::Read;
use std::sync::Arc;

/// Name given to a trip saved without one.
pub fn default_trip_name(now: DateTime<Utc>) -> String {
    format!("Trip {}", now.format("%Y-%m-%d"))
}

pub struct TripManager {
    api: ApiClient,
    trip: Trip,
    notifier: Arc<dyn NotificationSink>,
    renderer: Arc<dyn RenderSink>,
}

impl TripManager {
    pub fn new(
        api: ApiClient,
        notifier: Arc<dyn NotificationSink>,
        renderer: Arc<dyn RenderSink>,
    ) -> Self {
        Self {
            api,
            trip: Trip::default(),
            notifier,
            renderer,
        }
    }

    pub fn current(&self) -> &Trip {
        &self.trip
    }

    /// Validate raw rows into stops. Does not touch the current trip.
    pub fn ingest(&self, table: &RawTable) -> Result<Vec<Stop>, ValidationError> {
        ingest::ingest(table).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected stop input");
            self.notifier.notify(NoticeLevel::Error, &e.to_string());
        })
    }

    /// Replace the stop list. Name, mode and vehicle are kept.
    pub fn set_current_trip(&mut self, stops: Vec<Stop>) {
        self.trip.stops = stops;
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.trip.name = name.into();
    }

    /// Read a CSV file, replace the current trip with its stops and draw them.
    pub fn load_csv<R: Read>(&mut self, reader: R) -> Result<usize, ValidationError> {
        let table = RawTable::from_csv(reader).inspect_err(|e| {
            self.notifier.notify(NoticeLevel::Error, &e.to_string());
        })?;
        let stops = self.ingest(&table)?;
        let count = stops.len();

        self.trip = Trip::default();
        self.renderer.clear();
        self.set_current_trip(stops);
        self.renderer.draw(&RouteView::from_trip(&self.trip));

        tracing::info!(count, "Loaded stops from CSV");
        self.notifier
            .notify(NoticeLevel::Success, &format!("CSV loaded ({} points)", count));
        Ok(count)
    }

    /// Let the server parse a CSV file; its points become the current stops.
    pub async fn upload_csv(&mut self, file_name: &str, contents: Vec<u8>) -> Result<usize, NetworkError> {
        let stops = self
            .api
            .upload_csv(file_name, contents)
            .await
            .inspect_err(|e| self.notifier.notify(NoticeLevel::Error, &e.to_string()))?;
        let count = stops.len();

        self.set_current_trip(stops);
        self.renderer.draw(&RouteView::from_trip(&self.trip));
        self.notifier
            .notify(NoticeLevel::Success, "CSV uploaded successfully");
        Ok(count)
    }

    /// Have the route service order the current stops.
    ///
    /// The server may reorder stops; its order replaces ours. An empty trip
    /// fails before any network call.
    pub async fn build_route(
        &mut self,
        mode: TransportMode,
        vehicle: Vehicle,
    ) -> Result<Trip, RouteError> {
        if self.trip.is_empty() {
            self.notifier
                .notify(NoticeLevel::Error, "No route points to build from");
            return Err(RouteError::NoStops);
        }

        let ordered = self
            .api
            .build_route(&self.trip.stops, mode, vehicle)
            .await
            .map_err(|e| {
                self.notifier
                    .notify(NoticeLevel::Error, &format!("Failed to build route: {}", e));
                RouteError::from(e)
            })?;

        if ordered.is_empty() {
            tracing::warn!(sent = self.trip.stops.len(), "Route service returned no points, keeping order");
        } else {
            if ordered.len() != self.trip.stops.len() {
                tracing::warn!(
                    sent = self.trip.stops.len(),
                    received = ordered.len(),
                    "Route service changed the number of stops"
                );
            }
            self.trip.stops = ordered;
        }
        self.trip.mode = mode;
        self.trip.vehicle = vehicle;

        self.renderer.draw(&RouteView::from_trip(&self.trip));
        tracing::info!(
            stops = self.trip.stops.len(),
            mode = mode.as_str(),
            vehicle = vehicle.as_str(),
            "Route built"
        );
        self.notifier.notify(NoticeLevel::Success, "Route built");
        Ok(self.trip.clone())
    }

    /// Persist the current trip.
    ///
    /// The first save assigns the server's identifier to the trip; later
    /// saves carry it and update the same stored entry.
    pub async fn save(&mut self) -> Result<HistoryEntry, SaveError> {
        if !self.api.credentials().is_authenticated() {
            self.notifier.notify(NoticeLevel::Error, "Not authenticated");
            return Err(SaveError::Unauthenticated);
        }

        if self.trip.name.trim().is_empty() {
            self.trip.name = default_trip_name(Utc::now());
        }

        let updating = self.trip.id.is_some();
        let response = self.api.save_trip(&self.trip).await.map_err(|e| {
            self.notifier
                .notify(NoticeLevel::Error, &format!("Failed to save trip: {}", e));
            SaveError::from(e)
        })?;

        self.trip.id = Some(response.id);
        tracing::info!(id = ?self.trip.id, updating, "Trip saved");
        self.notifier.notify(NoticeLevel::Success, "Trip saved");
        Ok(HistoryEntry {
            trip: self.trip.clone(),
            saved_at: response.saved_at.or_else(|| Some(Utc::now())),
        })
    }

    /// Replace the current trip wholesale, e.g. with one opened from history.
    pub fn open(&mut self, trip: Trip) {
        self.trip = trip;
        self.renderer.draw(&RouteView::from_trip(&self.trip));
    }

    /// Reset to the empty trip and clear any drawn route.
    pub fn clear(&mut self) {
        self.trip = Trip::default();
        self.renderer.clear();
        self.notifier
            .notify(NoticeLevel::Info, "Current trip cleared");
    }
}
