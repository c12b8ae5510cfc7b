// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::sync::{Arc, Mutex};
use std::time::Duration;
use trip_planner::config::Config;
use trip_planner::models::Stop;
use trip_planner::services::{
    ApiClient, CredentialStore, HistoryManager, NoticeLevel, NotificationSink, RenderSink,
    RouteView, TripManager,
};

/// Notifier that remembers every notice.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<(NoticeLevel, String)> {
        self.notices.lock().unwrap().last().cloned()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().unwrap().push((level, message.to_string()));
    }
}

/// Renderer that remembers what it was asked to draw.
#[derive(Default)]
pub struct RecordingRenderer {
    drawn: Mutex<Vec<RouteView>>,
    clears: Mutex<usize>,
}

#[allow(dead_code)]
impl RecordingRenderer {
    pub fn drawn(&self) -> Vec<RouteView> {
        self.drawn.lock().unwrap().clone()
    }

    pub fn clears(&self) -> usize {
        *self.clears.lock().unwrap()
    }
}

impl RenderSink for RecordingRenderer {
    fn draw(&self, view: &RouteView) {
        self.drawn.lock().unwrap().push(view.clone());
    }

    fn clear(&self) {
        *self.clears.lock().unwrap() += 1;
    }
}

/// Config pointing at a mock server, with short timeouts and immediate retry.
#[allow(dead_code)]
pub fn test_config(api_url: &str) -> Config {
    Config {
        request_timeout: Duration::from_millis(500),
        ..Config::for_api(api_url)
    }
}

#[allow(dead_code)]
pub fn test_client(api_url: &str, token: Option<&str>) -> ApiClient {
    let credentials = CredentialStore::in_memory();
    if let Some(token) = token {
        credentials.set(token).unwrap();
    }
    ApiClient::new(&test_config(api_url), credentials).unwrap()
}

#[allow(dead_code)]
pub fn trip_manager(
    api: ApiClient,
) -> (TripManager, Arc<RecordingNotifier>, Arc<RecordingRenderer>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let renderer = Arc::new(RecordingRenderer::default());
    let trips = TripManager::new(api, notifier.clone(), renderer.clone());
    (trips, notifier, renderer)
}

#[allow(dead_code)]
pub fn history_manager(api: ApiClient) -> (HistoryManager, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    (HistoryManager::new(api, notifier.clone()), notifier)
}

#[allow(dead_code)]
pub fn sample_stops() -> Vec<Stop> {
    vec![
        Stop::new(47.2357, 39.7015, "Depot", true),
        Stop::new(47.2221, 39.7203, "Market", false),
        Stop::new(47.2513, 39.6902, "Station", false),
    ]
}
