// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Assets every cache generation must hold before it can be activated.
pub const STATIC_ASSETS: &[&str] = &[
    "/index.html",
    "/login.html",
    "/register.html",
    "/css/style.css",
    "/js/main.js",
    "/js/api.js",
    "/js/map.js",
    "/js/routes.js",
    "/js/upload.js",
    "/js/trips.js",
    "/js/history.js",
    "/js/push.js",
    "/js/auth.js",
    "/js/config.js",
];

/// Cached entry served to document requests when the network is down.
pub const OFFLINE_LANDING: &str = "/index.html";

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_CACHE_NAME: &str = "planner-cache-v2";

/// Deployment environment; picks the default API base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn default_api_url(&self) -> &'static str {
        match self {
            Environment::Development => "http://127.0.0.1:8000",
            Environment::Production => "https://planner.yourdomain.com",
        }
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::Invalid("PLANNER_ENV", other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    /// Base URL of the remote store and route service
    pub api_url: String,
    /// Per-call timeout
    pub request_timeout: Duration,
    /// Attempts made by retrying calls (at least one)
    pub retry_attempts: u32,
    /// Base delay for exponential backoff between attempts; zero retries immediately
    pub retry_backoff: Duration,
    /// Directory of the offline cache database
    pub cache_path: PathBuf,
    /// Name of the cache generation this build installs
    pub cache_name: String,
    /// File holding the stored bearer credential
    pub credential_path: PathBuf,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            api_url: Environment::Development.default_api_url().to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_backoff: Duration::ZERO,
            cache_path: PathBuf::from("data/offline-cache"),
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            credential_path: PathBuf::from("data/credential"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let environment = match env::var("PLANNER_ENV") {
            Ok(v) => Environment::parse(&v)?,
            Err(_) => Environment::Development,
        };

        Ok(Self {
            environment,
            api_url: env::var("PLANNER_API_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|_| environment.default_api_url().to_string()),
            request_timeout: Duration::from_millis(parse_var(
                "REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )?),
            retry_attempts: parse_var("RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS)?.max(1),
            retry_backoff: Duration::from_millis(parse_var("RETRY_BACKOFF_MS", 0u64)?),
            cache_path: env::var("CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/offline-cache")),
            cache_name: env::var("CACHE_NAME").unwrap_or_else(|_| DEFAULT_CACHE_NAME.to_string()),
            credential_path: env::var("CREDENTIAL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/credential")),
        })
    }

    /// Config pointing at a specific API base, for tests and tools.
    pub fn for_api(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, v.clone())),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
