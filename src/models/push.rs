// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push payloads relayed by the cache agent into user-visible notifications.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "Planner";
pub const DEFAULT_BODY: &str = "New notification!";
pub const DEFAULT_URL: &str = "/";
pub const NOTIFICATION_ICON: &str = "/favicon.ico";

/// Transient push message. Consumed once by the relay, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
    #[serde(rename = "url")]
    pub target_url: String,
}

impl Default for PushNotification {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            body: DEFAULT_BODY.to_string(),
            target_url: DEFAULT_URL.to_string(),
        }
    }
}

impl PushNotification {
    /// Parse a push payload. Absent or malformed payloads yield the default
    /// notification; missing fields fall back individually.
    pub fn from_payload(payload: Option<&[u8]>) -> Self {
        #[derive(Deserialize)]
        struct Partial {
            title: Option<String>,
            body: Option<String>,
            url: Option<String>,
        }

        let Some(bytes) = payload else {
            return Self::default();
        };

        match serde_json::from_slice::<Partial>(bytes) {
            Ok(p) => {
                let defaults = Self::default();
                Self {
                    title: p.title.unwrap_or(defaults.title),
                    body: p.body.unwrap_or(defaults.body),
                    target_url: p.url.unwrap_or(defaults.target_url),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Malformed push payload, using defaults");
                Self::default()
            }
        }
    }
}

/// A notification handed to the host environment for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedNotification {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    /// Routing metadata: the view to bring up when activated
    pub target_url: String,
}

impl DisplayedNotification {
    pub fn new(id: u64, push: PushNotification) -> Self {
        Self {
            id,
            title: push.title,
            body: push.body,
            icon: NOTIFICATION_ICON.to_string(),
            badge: NOTIFICATION_ICON.to_string(),
            target_url: push.target_url,
        }
    }
}
