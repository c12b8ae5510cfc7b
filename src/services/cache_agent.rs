// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background cache agent.
//!
//! The agent is a task that owns the cache store and talks to the rest of
//! the application only through messages. Because every store read and the
//! generation swap happen on the agent's own task, a request either sees
//! the old generation in full or the new one in full.
//!
//! Lifecycle: `Installing -> Activating -> Serving`. A failed install leaves
//! the previously active generation serving.

use crate::config::{Config, ConfigError, OFFLINE_LANDING, STATIC_ASSETS};
use crate::error::{CacheError, NetworkError};
use crate::models::{DisplayedNotification, PushNotification, StoredResponse};
use crate::services::cache_store::{CacheStore, Generation};
use crate::services::host::HostEnvironment;
use futures_util::future::try_join_all;
use reqwest::{Method, Url};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const MAILBOX_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Origin whose responses may be cached
    pub origin: Url,
    pub generation: Generation,
    /// Asset paths fetched on install
    pub manifest: Vec<String>,
    /// Path served to document requests when offline
    pub offline_fallback: String,
    pub request_timeout: Duration,
}

impl AgentConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let origin = Url::parse(&config.api_url)
            .map_err(|e| ConfigError::Invalid("PLANNER_API_URL", format!("{}: {}", config.api_url, e)))?;
        Ok(Self {
            origin,
            generation: Generation::new(config.cache_name.clone()),
            manifest: STATIC_ASSETS.iter().map(|s| s.to_string()).collect(),
            offline_fallback: OFFLINE_LANDING.to_string(),
            request_timeout: config.request_timeout,
        })
    }

    pub fn with_manifest<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest = paths.into_iter().map(Into::into).collect();
        self
    }
}

/// What the intercepted request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// A page load; may fall back to the offline landing page
    Document,
    #[default]
    Data,
}

/// An outbound request handed to the agent.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub destination: Destination,
    /// Network first, cached copy only when the network fails
    pub fresh: bool,
}

impl InterceptedRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
            body: None,
            destination: Destination::Data,
            fresh: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Installing,
    Activating,
    Serving,
    Terminated,
}

/// Result of activating a displayed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// An open view already showed the target and was brought forward
    Focused(u64),
    /// A new view was opened at the target
    Opened(u64),
}

enum Message {
    Install {
        reply: oneshot::Sender<Result<usize, CacheError>>,
    },
    Installed {
        result: Result<Vec<(String, StoredResponse)>, CacheError>,
        reply: oneshot::Sender<Result<usize, CacheError>>,
    },
    Activate {
        reply: oneshot::Sender<Result<Vec<String>, CacheError>>,
    },
    Fetch {
        request: InterceptedRequest,
        reply: oneshot::Sender<Result<StoredResponse, NetworkError>>,
    },
    Store {
        generation: Generation,
        key: String,
        response: StoredResponse,
    },
    Push {
        payload: Option<Vec<u8>>,
        reply: oneshot::Sender<DisplayedNotification>,
    },
    NotificationClick {
        id: u64,
        reply: oneshot::Sender<Option<ClickOutcome>>,
    },
    State {
        reply: oneshot::Sender<AgentState>,
    },
    Shutdown,
}

/// Cloneable handle to a running agent.
#[derive(Debug, Clone)]
pub struct CacheAgentHandle {
    tx: mpsc::Sender<Message>,
}

impl CacheAgentHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Message,
    ) -> Result<T, CacheError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| CacheError::AgentStopped)?;
        rx.await.map_err(|_| CacheError::AgentStopped)
    }

    /// Populate the configured generation. Returns the number of entries.
    pub async fn install(&self) -> Result<usize, CacheError> {
        self.request(|reply| Message::Install { reply }).await?
    }

    /// Make the installed generation the only one. Returns purged names.
    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        self.request(|reply| Message::Activate { reply }).await?
    }

    pub async fn install_and_activate(&self) -> Result<(), CacheError> {
        self.install().await?;
        self.activate().await?;
        Ok(())
    }

    pub async fn fetch(&self, request: InterceptedRequest) -> Result<StoredResponse, NetworkError> {
        match self.request(|reply| Message::Fetch { request, reply }).await {
            Ok(result) => result,
            Err(e) => Err(NetworkError::Unreachable(e.to_string())),
        }
    }

    /// Relay a push event. Returns the notification handed to the host.
    pub async fn push(&self, payload: Option<Vec<u8>>) -> Result<DisplayedNotification, CacheError> {
        self.request(|reply| Message::Push { payload, reply }).await
    }

    /// The user activated notification `id`. `None` if it is unknown.
    pub async fn notification_clicked(&self, id: u64) -> Result<Option<ClickOutcome>, CacheError> {
        self.request(|reply| Message::NotificationClick { id, reply })
            .await
    }

    pub async fn state(&self) -> AgentState {
        self.request(|reply| Message::State { reply })
            .await
            .unwrap_or(AgentState::Terminated)
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown).await;
    }
}

pub struct CacheAgent {
    config: AgentConfig,
    store: CacheStore,
    host: Arc<dyn HostEnvironment>,
    http: reqwest::Client,
    self_tx: mpsc::WeakSender<Message>,
    state: AgentState,
    active: Option<Generation>,
    installed: bool,
    offline_key: String,
    next_notification_id: u64,
    pending_clicks: HashMap<u64, String>,
}

impl CacheAgent {
    /// Start the agent on the current runtime.
    ///
    /// If the configured generation is already in the store it serves
    /// immediately; otherwise the newest older generation serves until the
    /// new one is installed and activated.
    pub fn spawn(
        config: AgentConfig,
        store: CacheStore,
        host: Arc<dyn HostEnvironment>,
    ) -> Result<CacheAgentHandle, CacheError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CacheError::Client(e.to_string()))?;

        let generations = store.generations();
        let installed = generations.contains(&config.generation);
        let (active, state) = if installed {
            (Some(config.generation.clone()), AgentState::Serving)
        } else {
            (generations.last().cloned(), AgentState::Installing)
        };

        let offline_key = config
            .origin
            .join(&config.offline_fallback)
            .map(|url| request_key(&config.origin, &Method::GET, &url))
            .unwrap_or_else(|_| format!("GET {}", config.offline_fallback));

        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        tracing::info!(
            generation = config.generation.name(),
            active = active.as_ref().map(Generation::name),
            ?state,
            "Starting cache agent"
        );

        let agent = CacheAgent {
            config,
            store,
            host,
            http,
            self_tx: tx.downgrade(),
            state,
            active,
            installed,
            offline_key,
            next_notification_id: 0,
            pending_clicks: HashMap::new(),
        };
        tokio::spawn(agent.run(rx));
        Ok(CacheAgentHandle { tx })
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Message>) {
        while let Some(message) = rx.recv().await {
            match message {
                Message::Shutdown => break,
                Message::Install { reply } => self.handle_install(reply),
                Message::Installed { result, reply } => self.handle_installed(result, reply),
                Message::Activate { reply } => {
                    let _ = reply.send(self.handle_activate());
                }
                Message::Fetch { request, reply } => self.handle_fetch(request, reply),
                Message::Store {
                    generation,
                    key,
                    response,
                } => self.handle_store(generation, key, response),
                Message::Push { payload, reply } => {
                    let _ = reply.send(self.handle_push(payload));
                }
                Message::NotificationClick { id, reply } => {
                    let _ = reply.send(self.handle_click(id));
                }
                Message::State { reply } => {
                    let _ = reply.send(self.state);
                }
            }
        }
        self.state = AgentState::Terminated;
        tracing::info!(generation = self.config.generation.name(), "Cache agent stopped");
    }

    fn handle_install(&mut self, reply: oneshot::Sender<Result<usize, CacheError>>) {
        self.state = AgentState::Installing;
        tracing::info!(
            generation = self.config.generation.name(),
            assets = self.config.manifest.len(),
            "Installing cache generation"
        );

        let origin = &self.config.origin;
        let targets = self
            .config
            .manifest
            .iter()
            .map(|path| {
                origin
                    .join(path)
                    .map(|url| (request_key(origin, &Method::GET, &url), url))
                    .map_err(|e| CacheError::Install {
                        key: path.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>();
        let targets = match targets {
            Ok(targets) => targets,
            Err(e) => {
                self.handle_installed(Err(e), reply);
                return;
            }
        };

        let http = self.http.clone();
        let tx = self.self_tx.upgrade();
        let timeout_ms = self.timeout_ms();
        tokio::spawn(async move {
            let fetches = targets.into_iter().map(|(key, url)| {
                let http = http.clone();
                async move {
                    let response = fetch_network(&http, &InterceptedRequest::get(url), timeout_ms)
                        .await
                        .map_err(|e| CacheError::Install {
                            key: key.clone(),
                            reason: e.to_string(),
                        })?;
                    if response.status != 200 {
                        return Err(CacheError::Install {
                            key,
                            reason: format!("HTTP {}", response.status),
                        });
                    }
                    Ok((key, response))
                }
            });
            let result = try_join_all(fetches).await;

            match tx {
                Some(tx) => {
                    if let Err(mpsc::error::SendError(Message::Installed { reply, .. })) =
                        tx.send(Message::Installed { result, reply }).await
                    {
                        let _ = reply.send(Err(CacheError::AgentStopped));
                    }
                }
                None => {
                    let _ = reply.send(Err(CacheError::AgentStopped));
                }
            }
        });
    }

    fn handle_installed(
        &mut self,
        result: Result<Vec<(String, StoredResponse)>, CacheError>,
        reply: oneshot::Sender<Result<usize, CacheError>>,
    ) {
        let outcome = result.and_then(|responses| self.store.install(&self.config.generation, responses));
        match &outcome {
            Ok(count) => {
                self.installed = true;
                self.state = AgentState::Activating;
                tracing::info!(
                    generation = self.config.generation.name(),
                    entries = count,
                    "Cache generation installed"
                );
            }
            Err(e) => {
                // The previous generation, if any, keeps serving
                self.state = if self.active.is_some() {
                    AgentState::Serving
                } else {
                    AgentState::Installing
                };
                tracing::error!(
                    generation = self.config.generation.name(),
                    error = %e,
                    "Cache install failed"
                );
            }
        }
        let _ = reply.send(outcome);
    }

    fn handle_activate(&mut self) -> Result<Vec<String>, CacheError> {
        if !self.installed {
            return Err(CacheError::NotInstalled);
        }
        self.state = AgentState::Activating;
        let purged = self.store.purge_except(&self.config.generation)?;
        for name in &purged {
            tracing::info!(generation = %name, "Deleting old cache generation");
        }
        self.active = Some(self.config.generation.clone());
        self.host.claim_views(self.config.generation.name());
        self.state = AgentState::Serving;
        tracing::info!(generation = self.config.generation.name(), "Cache generation active");
        Ok(purged)
    }

    fn handle_fetch(
        &mut self,
        request: InterceptedRequest,
        reply: oneshot::Sender<Result<StoredResponse, NetworkError>>,
    ) {
        let http = self.http.clone();
        let timeout_ms = self.timeout_ms();

        if request.method != Method::GET {
            tracing::debug!(method = %request.method, url = %request.url, "Passing request through");
            tokio::spawn(async move {
                let _ = reply.send(fetch_network(&http, &request, timeout_ms).await);
            });
            return;
        }

        let key = request_key(&self.config.origin, &request.method, &request.url);
        let cached = self.lookup(&key);
        if !request.fresh {
            if let Some(hit) = cached {
                tracing::debug!(key = %key, "Cache hit");
                let _ = reply.send(Ok(hit));
                return;
            }
        }
        tracing::debug!(key = %key, fresh = request.fresh, "Fetching from network");

        let fallback = match cached {
            Some(cached) => Some(cached),
            None if request.destination == Destination::Document => {
                let offline_key = self.offline_key.clone();
                self.lookup(&offline_key)
            }
            None => None,
        };
        let target = self.active.clone();
        let tx = self.self_tx.upgrade();
        let origin = self.config.origin.clone();

        tokio::spawn(async move {
            match fetch_network(&http, &request, timeout_ms).await {
                Ok(response) => {
                    if let (Some(generation), Some(tx)) = (target, tx) {
                        if is_cacheable(&origin, &request.url, &response) {
                            let _ = tx
                                .send(Message::Store {
                                    generation,
                                    key,
                                    response: response.clone(),
                                })
                                .await;
                        }
                    }
                    let _ = reply.send(Ok(response));
                }
                Err(e) => match fallback {
                    Some(cached) => {
                        tracing::warn!(key = %key, error = %e, "Network failed, serving cached copy");
                        let _ = reply.send(Ok(cached));
                    }
                    None => {
                        let _ = reply.send(Err(e));
                    }
                },
            }
        });
    }

    fn handle_store(&mut self, generation: Generation, key: String, response: StoredResponse) {
        // A response fetched under a generation that has since been replaced is dropped
        if self.active.as_ref() != Some(&generation) {
            tracing::debug!(key = %key, generation = generation.name(), "Discarding stale response");
            return;
        }
        match self.store.put(&generation, &key, response) {
            Ok(()) => tracing::debug!(key = %key, "Cached response"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to cache response"),
        }
    }

    fn handle_push(&mut self, payload: Option<Vec<u8>>) -> DisplayedNotification {
        let push = PushNotification::from_payload(payload.as_deref());
        self.next_notification_id += 1;
        let notification = DisplayedNotification::new(self.next_notification_id, push);
        self.pending_clicks
            .insert(notification.id, notification.target_url.clone());
        self.host.show_notification(&notification);
        notification
    }

    fn handle_click(&mut self, id: u64) -> Option<ClickOutcome> {
        self.host.dismiss_notification(id);
        let url = self.pending_clicks.remove(&id)?;
        let target = self.resolve(&url);

        let existing = self
            .host
            .client_views()
            .into_iter()
            .find(|view| self.resolve(&view.url) == target);
        if let Some(view) = existing {
            if self.host.focus_view(view.id) {
                tracing::debug!(view = view.id, url = %target, "Focused existing view");
                return Some(ClickOutcome::Focused(view.id));
            }
        }

        let id = self.host.open_view(&target);
        tracing::debug!(view = id, url = %target, "Opened new view");
        Some(ClickOutcome::Opened(id))
    }

    fn lookup(&self, key: &str) -> Option<StoredResponse> {
        let generation = self.active.as_ref()?;
        match self.store.get(generation, key) {
            Ok(entry) => entry.map(|e| e.stored_response),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed");
                None
            }
        }
    }

    fn resolve(&self, url: &str) -> String {
        self.config
            .origin
            .join(url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string())
    }

    fn timeout_ms(&self) -> u64 {
        self.config.request_timeout.as_millis() as u64
    }
}

/// Cache key for a request: method, path and sorted query for the agent's
/// own origin, the full URL for anything else.
pub fn request_key(origin: &Url, method: &Method, url: &Url) -> String {
    if url.origin() != origin.origin() {
        return format!("{} {}", method, url);
    }

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    pairs.sort();
    let mut key = format!("{} {}", method, url.path());
    if !pairs.is_empty() {
        let query = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        key.push('?');
        key.push_str(&query);
    }
    key
}

fn is_cacheable(origin: &Url, url: &Url, response: &StoredResponse) -> bool {
    response.status == 200 && url.origin() == origin.origin()
}

async fn fetch_network(
    http: &reqwest::Client,
    request: &InterceptedRequest,
    timeout_ms: u64,
) -> Result<StoredResponse, NetworkError> {
    let endpoint = request.url.path().to_string();
    let mut builder = http.request(request.method.clone(), request.url.clone());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }

    let response = builder
        .send()
        .await
        .map_err(|e| NetworkError::from_reqwest(&endpoint, timeout_ms, e))?;
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response
        .bytes()
        .await
        .map_err(|e| NetworkError::from_reqwest(&endpoint, timeout_ms, e))?;

    Ok(StoredResponse {
        status,
        content_type,
        body: body.to_vec(),
    })
}
