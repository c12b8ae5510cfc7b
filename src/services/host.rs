// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Host environment the cache agent runs under.
//!
//! The host owns notification display and the set of open application
//! views. The agent only asks it to do things; it never shares state with it.

use crate::models::DisplayedNotification;
use std::sync::Mutex;

/// An open application view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientView {
    pub id: u64,
    pub url: String,
    /// Cache generation controlling this view, if any
    pub controller: Option<String>,
}

pub trait HostEnvironment: Send + Sync {
    fn show_notification(&self, notification: &DisplayedNotification);
    fn dismiss_notification(&self, id: u64);
    fn client_views(&self) -> Vec<ClientView>;
    /// Bring a view to the foreground. Returns false if it no longer exists.
    fn focus_view(&self, id: u64) -> bool;
    fn open_view(&self, url: &str) -> u64;
    /// Make `generation` the controller of every open view.
    fn claim_views(&self, generation: &str);
}

#[derive(Debug, Default)]
struct HostState {
    next_id: u64,
    views: Vec<ClientView>,
    focused: Option<u64>,
    notifications: Vec<DisplayedNotification>,
}

/// Headless host keeping views and notifications in memory.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: Mutex<HostState>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications currently on display.
    pub fn notifications(&self) -> Vec<DisplayedNotification> {
        self.lock().notifications.clone()
    }

    pub fn focused(&self) -> Option<u64> {
        self.lock().focused
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostState> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl HostEnvironment for InMemoryHost {
    fn show_notification(&self, notification: &DisplayedNotification) {
        tracing::info!(
            id = notification.id,
            title = %notification.title,
            url = %notification.target_url,
            "Showing notification"
        );
        self.lock().notifications.push(notification.clone());
    }

    fn dismiss_notification(&self, id: u64) {
        self.lock().notifications.retain(|n| n.id != id);
    }

    fn client_views(&self) -> Vec<ClientView> {
        self.lock().views.clone()
    }

    fn focus_view(&self, id: u64) -> bool {
        let mut state = self.lock();
        if state.views.iter().any(|v| v.id == id) {
            state.focused = Some(id);
            true
        } else {
            false
        }
    }

    fn open_view(&self, url: &str) -> u64 {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.views.push(ClientView {
            id,
            url: url.to_string(),
            controller: None,
        });
        state.focused = Some(id);
        id
    }

    fn claim_views(&self, generation: &str) {
        for view in self.lock().views.iter_mut() {
            view.controller = Some(generation.to_string());
        }
    }
}
