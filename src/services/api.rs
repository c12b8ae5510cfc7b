// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client for the remote trip store and route service.
//!
//! Every call is bounded by a timeout and classified into a
//! [`NetworkError`]. Read-only calls are routed through the cache agent when
//! one is attached; everything else goes straight to the network.

use crate::config::Config;
use crate::error::NetworkError;
use crate::models::{HistoryEntry, Stop, TransportMode, Trip, TripId, Vehicle};
use crate::services::auth::CredentialStore;
use crate::services::cache_agent::{CacheAgentHandle, InterceptedRequest};
use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

/// Upper bound on a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Request payload.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    /// Sent as multipart form field `file`
    CsvFile { file_name: String, contents: Vec<u8> },
}

/// One outbound call: endpoint, method, query and optional body.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// Ask the cache agent for a network-first read
    pub fresh: bool,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
            fresh: false,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn csv_file(mut self, file_name: impl Into<String>, contents: Vec<u8>) -> Self {
        self.body = Some(RequestBody::CsvFile {
            file_name: file_name.into(),
            contents,
        });
        self
    }

    pub fn fresh(mut self) -> Self {
        self.fresh = true;
        self
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, NetworkError> {
        serde_json::from_slice(&self.body).map_err(|e| NetworkError::Decode(e.to_string()))
    }
}

/// A failed attempt, reported to the observability channel.
#[derive(Debug, Clone, PartialEq)]
pub struct CallFailure {
    pub endpoint: String,
    pub attempt: u32,
    pub error: NetworkError,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveResponse {
    pub id: TripId,
    #[serde(default, alias = "date")]
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    #[serde(default)]
    points: Vec<Stop>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryResponse {
    Wrapped { history: Vec<HistoryEntry> },
    Bare(Vec<HistoryEntry>),
}

/// Network call wrapper for the planner backend.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    retry_attempts: u32,
    retry_backoff: Duration,
    credentials: CredentialStore,
    cache: Option<CacheAgentHandle>,
    failures: Option<mpsc::UnboundedSender<CallFailure>>,
}

impl ApiClient {
    pub fn new(config: &Config, credentials: CredentialStore) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.api_url)
            .with_context(|| format!("invalid API base URL {}", config.api_url))?;
        let http = reqwest::Client::builder()
            .build()
            .context("failed building API HTTP client")?;

        Ok(Self {
            http,
            base_url,
            timeout: config.request_timeout,
            retry_attempts: config.retry_attempts.max(1),
            retry_backoff: config.retry_backoff,
            credentials,
            cache: None,
            failures: None,
        })
    }

    /// Route read-only calls through a cache agent.
    pub fn with_cache_agent(mut self, agent: CacheAgentHandle) -> Self {
        self.cache = Some(agent);
        self
    }

    /// Report every failed attempt on `sink`. Sending never blocks.
    pub fn with_failure_sink(mut self, sink: mpsc::UnboundedSender<CallFailure>) -> Self {
        self.failures = Some(sink);
        self
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Issue a single call.
    pub async fn call(&self, request: &ApiRequest) -> Result<ApiResponse, NetworkError> {
        self.attempt(request, 1).await
    }

    /// Issue a call, retrying network failures up to `max_attempts` in total.
    /// The last error is returned when every attempt fails.
    pub async fn call_with_retry(
        &self,
        request: &ApiRequest,
        max_attempts: u32,
    ) -> Result<ApiResponse, NetworkError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(request, attempt).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        endpoint = %request.endpoint,
                        attempt,
                        retries_left = max_attempts - attempt,
                        "Retrying API call"
                    );
                    if let Some(delay) = self.backoff(attempt) {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Retrying call with the configured attempt count, decoding a JSON body.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, NetworkError> {
        self.call_with_retry(request, self.retry_attempts)
            .await?
            .json()
    }

    fn backoff(&self, attempt: u32) -> Option<Duration> {
        if self.retry_backoff.is_zero() {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        Some(self.retry_backoff.saturating_mul(factor).min(MAX_BACKOFF))
    }

    async fn attempt(&self, request: &ApiRequest, attempt: u32) -> Result<ApiResponse, NetworkError> {
        let timeout_ms = self.timeout.as_millis() as u64;

        // Dropping the dispatch future on timeout cancels the in-flight request
        let result = match tokio::time::timeout(self.timeout, self.dispatch(request)).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout {
                endpoint: request.endpoint.clone(),
                timeout_ms,
            }),
        };

        if let Err(e) = &result {
            tracing::error!(
                endpoint = %request.endpoint,
                method = %request.method,
                attempt,
                error = %e,
                "API call failed"
            );
            if let Some(sink) = &self.failures {
                let _ = sink.send(CallFailure {
                    endpoint: request.endpoint.clone(),
                    attempt,
                    error: e.clone(),
                });
            }
        }
        result
    }

    fn url(&self, request: &ApiRequest) -> Result<Url, NetworkError> {
        let mut url = self
            .base_url
            .join(&request.endpoint)
            .map_err(|e| NetworkError::Unreachable(format!("invalid endpoint {}: {}", request.endpoint, e)))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, NetworkError> {
        let url = self.url(request)?;
        let token = self.credentials.token();

        let (status, content_type, body) = match (&self.cache, request.method == Method::GET) {
            (Some(agent), true) => {
                let headers = token
                    .iter()
                    .map(|token| ("Authorization".to_string(), format!("Bearer {}", token)))
                    .collect();
                let stored = agent
                    .fetch(InterceptedRequest {
                        headers,
                        fresh: request.fresh,
                        ..InterceptedRequest::get(url)
                    })
                    .await?;
                (stored.status, stored.content_type, stored.body)
            }
            _ => self.send_direct(request, url, token.as_deref()).await?,
        };

        if !(200..300).contains(&status) {
            return Err(NetworkError::Rejected {
                status,
                detail: rejection_detail(&body),
            });
        }

        Ok(ApiResponse {
            status,
            content_type,
            body,
        })
    }

    async fn send_direct(
        &self,
        request: &ApiRequest,
        url: Url,
        token: Option<&str>,
    ) -> Result<(u16, Option<String>, Vec<u8>), NetworkError> {
        let timeout_ms = self.timeout.as_millis() as u64;
        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::CsvFile {
                file_name,
                contents,
            }) => {
                let part = reqwest::multipart::Part::bytes(contents.clone())
                    .file_name(file_name.clone())
                    .mime_str("text/csv")
                    .map_err(|e| NetworkError::Unreachable(e.to_string()))?;
                builder.multipart(reqwest::multipart::Form::new().part("file", part))
            }
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(&request.endpoint, timeout_ms, e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::from_reqwest(&request.endpoint, timeout_ms, e))?;

        Ok((status, content_type, body.to_vec()))
    }

    // ─── Authentication ──────────────────────────────────────────────────────

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, NetworkError> {
        let request = ApiRequest::post("/auth/login")
            .json(serde_json::json!({ "email": email, "password": password }));
        self.call_json(&request).await
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), NetworkError> {
        let request = ApiRequest::post("/auth/register").json(serde_json::json!({
            "username": name,
            "email": email,
            "password": password,
        }));
        self.call_with_retry(&request, self.retry_attempts).await?;
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), NetworkError> {
        self.call_with_retry(&ApiRequest::post("/auth/logout"), self.retry_attempts)
            .await?;
        Ok(())
    }

    /// Profile of the authenticated user. Always read from the network first.
    pub async fn me(&self) -> Result<Value, NetworkError> {
        self.call_json(&ApiRequest::get("/auth/me").fresh()).await
    }

    // ─── Routes and trips ────────────────────────────────────────────────────

    /// Upload a CSV file for server-side parsing.
    pub async fn upload_csv(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<Vec<Stop>, NetworkError> {
        let request = ApiRequest::post("/routes/upload").csv_file(file_name, contents);
        let response: PointsResponse = self.call_json(&request).await?;
        Ok(response.points)
    }

    /// Ask the route service to order `stops`. Returns the server's order.
    pub async fn build_route(
        &self,
        stops: &[Stop],
        mode: TransportMode,
        vehicle: Vehicle,
    ) -> Result<Vec<Stop>, NetworkError> {
        let request = ApiRequest::post("/routes/build")
            .query("mode", mode.as_str())
            .query("vehicle", vehicle.as_str())
            .json(serde_json::json!({ "points": stops }));
        let response: PointsResponse = self.call_json(&request).await?;
        Ok(response.points)
    }

    /// Persist a trip. A trip carrying an id is updated in place.
    pub async fn save_trip(&self, trip: &Trip) -> Result<SaveResponse, NetworkError> {
        let request = ApiRequest::post("/routes/save").json(serde_json::json!({ "trip": trip }));
        self.call_json(&request).await
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>, NetworkError> {
        let response: HistoryResponse = self
            .call_json(&ApiRequest::get("/routes/history").fresh())
            .await?;
        Ok(match response {
            HistoryResponse::Wrapped { history } => history,
            HistoryResponse::Bare(history) => history,
        })
    }

    pub async fn update_trip(&self, id: &TripId, entry: &HistoryEntry) -> Result<(), NetworkError> {
        let request = ApiRequest::put(format!("/trips/update/{}", urlencoding::encode(id.as_str())))
            .json(serde_json::json!(entry));
        self.call_with_retry(&request, self.retry_attempts).await?;
        Ok(())
    }

    pub async fn delete_trip(&self, id: &TripId) -> Result<(), NetworkError> {
        let request =
            ApiRequest::delete(format!("/trips/delete/{}", urlencoding::encode(id.as_str())));
        self.call_with_retry(&request, self.retry_attempts).await?;
        Ok(())
    }

    // ─── Push subscriptions ──────────────────────────────────────────────────

    pub async fn subscribe_push(&self, subscription: Value) -> Result<(), NetworkError> {
        let request = ApiRequest::post("/push/subscribe").json(subscription);
        self.call_with_retry(&request, self.retry_attempts).await?;
        Ok(())
    }

    pub async fn unsubscribe_push(&self) -> Result<(), NetworkError> {
        self.call_with_retry(&ApiRequest::post("/push/unsubscribe"), self.retry_attempts)
            .await?;
        Ok(())
    }
}

/// Human-readable reason from a rejected response body. Prefers a JSON
/// `detail` field, falls back to the raw text.
fn rejection_detail(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(detail) = value.get("detail").and_then(Value::as_str) {
            return detail.to_string();
        }
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        "Network error".to_string()
    } else {
        text
    }
}
