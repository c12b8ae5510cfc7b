// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! History of saved trips.
//!
//! The local list is a read-only mirror of the remote store. Listing always
//! refetches. Renames are applied locally before the server confirms them
//! and are not rolled back on failure: after an error the caller must list
//! again to resynchronize.

use crate::error::HistoryError;
use crate::models::{HistoryEntry, TripId};
use crate::services::api::ApiClient;
use crate::services::notify::{NoticeLevel, NotificationSink};
use crate::services::trips::TripManager;
use std::sync::Arc;

pub struct HistoryManager {
    api: ApiClient,
    entries: Vec<HistoryEntry>,
    notifier: Arc<dyn NotificationSink>,
}

impl HistoryManager {
    pub fn new(api: ApiClient, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            api,
            entries: Vec::new(),
            notifier,
        }
    }

    /// Fetch the saved trips, replacing the local mirror.
    pub async fn list(&mut self) -> Result<&[HistoryEntry], HistoryError> {
        let fetched = self.api.history().await.map_err(|e| {
            self.notifier
                .notify(NoticeLevel::Error, "Failed to load history");
            HistoryError::from(e)
        })?;

        let total = fetched.len();
        self.entries = fetched
            .into_iter()
            .filter(|entry| entry.id().is_some())
            .collect();
        if self.entries.len() != total {
            tracing::warn!(
                dropped = total - self.entries.len(),
                "Ignoring history entries without an identifier"
            );
        }
        tracing::debug!(count = self.entries.len(), "History listed");
        Ok(&self.entries)
    }

    /// The entries from the last successful listing.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Make a saved trip the current trip and draw it. The identifier comes
    /// along, so saving it again updates the stored entry.
    pub fn view(&self, id: &TripId, trips: &mut TripManager) -> Result<(), HistoryError> {
        let entry = self.find(id)?;
        trips.open(entry.trip.clone());
        self.notifier.notify(
            NoticeLevel::Info,
            &format!("Route \"{}\" loaded", entry.name()),
        );
        Ok(())
    }

    /// Rename a saved trip.
    pub async fn edit(&mut self, id: &TripId, new_name: &str) -> Result<(), HistoryError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(HistoryError::EmptyName);
        }

        let position = self.position(id)?;
        self.entries[position].trip.name = new_name.to_string();
        let entry = self.entries[position].clone();

        match self.api.update_trip(id, &entry).await {
            Ok(()) => {
                tracing::info!(%id, "Trip renamed");
                self.notifier.notify(NoticeLevel::Success, "Trip updated");
                Ok(())
            }
            Err(e) => {
                // The local rename stays; only a fresh listing restores the stored name
                tracing::warn!(%id, error = %e, "Rename rejected, history must be re-listed");
                self.notifier.notify(
                    NoticeLevel::Error,
                    "Failed to update trip, reload history to see the stored name",
                );
                Err(e.into())
            }
        }
    }

    /// Delete a saved trip once `confirm` approves it.
    ///
    /// Returns `Ok(false)` without contacting the server when confirmation
    /// is declined. On success the entry is dropped from the local list
    /// without a refetch.
    pub async fn delete<F>(&mut self, id: &TripId, confirm: F) -> Result<bool, HistoryError>
    where
        F: FnOnce(&HistoryEntry) -> bool,
    {
        let position = self.position(id)?;
        if !confirm(&self.entries[position]) {
            return Ok(false);
        }

        self.api.delete_trip(id).await.map_err(|e| {
            self.notifier
                .notify(NoticeLevel::Error, "Failed to delete trip");
            HistoryError::from(e)
        })?;

        self.entries.retain(|entry| entry.id() != Some(id));
        tracing::info!(%id, "Trip deleted");
        self.notifier.notify(NoticeLevel::Warning, "Trip deleted");
        Ok(true)
    }

    fn find(&self, id: &TripId) -> Result<&HistoryEntry, HistoryError> {
        self.entries
            .iter()
            .find(|entry| entry.id() == Some(id))
            .ok_or_else(|| HistoryError::UnknownEntry(id.to_string()))
    }

    fn position(&self, id: &TripId) -> Result<usize, HistoryError> {
        self.entries
            .iter()
            .position(|entry| entry.id() == Some(id))
            .ok_or_else(|| HistoryError::UnknownEntry(id.to_string()))
    }
}
