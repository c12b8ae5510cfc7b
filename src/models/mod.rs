// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the planner client.

pub mod cache;
pub mod push;
pub mod stop;
pub mod trip;

pub use cache::{CacheEntry, StoredResponse};
pub use push::{DisplayedNotification, PushNotification};
pub use stop::Stop;
pub use trip::{HistoryEntry, TransportMode, Trip, TripId, Vehicle};
