// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error taxonomy shared by the planner services.
//!
//! Recoverable errors (validation, network) are surfaced to the notice sink
//! by the services that produce them; none of them abort the process.

/// Outcome of a failed outbound call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetworkError {
    #[error("Request to {endpoint} exceeded {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("HTTP {status}: {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// A successful response whose body could not be parsed.
    #[error("Malformed response body: {0}")]
    Decode(String),
}

impl NetworkError {
    /// Whether the retry wrapper may issue the call again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, NetworkError::Decode(_))
    }

    /// Whether the remote store refused the credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, NetworkError::Rejected { status: 401, .. })
    }

    pub(crate) fn from_reqwest(endpoint: &str, timeout_ms: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms,
            }
        } else {
            NetworkError::Unreachable(err.to_string())
        }
    }
}

/// Malformed tabular input. The caller must re-prompt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("CSV is empty or malformed")]
    EmptyInput,

    #[error("CSV must contain a {0} column")]
    MissingColumn(&'static str),

    /// `row` is 1-indexed and counts the header line.
    #[error("Invalid coordinates in row {row}")]
    InvalidCoordinates { row: usize },

    #[error("Unreadable CSV: {0}")]
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    #[error("No stops to build a route from")]
    NoStops,

    #[error("Route service failed: {0}")]
    Network(#[from] NetworkError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SaveError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Saving trip failed: {0}")]
    Network(#[from] NetworkError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistoryError {
    #[error("No trip {0} in history")]
    UnknownEntry(String),

    #[error("Trip name must not be empty")]
    EmptyName,

    #[error("History request failed: {0}")]
    Network(#[from] NetworkError),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    InvalidInput(String),

    #[error("Login response carried no access token")]
    MissingToken,

    #[error("Credential storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Authentication request failed: {0}")]
    Network(#[from] NetworkError),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache store error: {0}")]
    Store(#[from] sled::Error),

    #[error("Corrupt cache entry: {0}")]
    Encoding(String),

    #[error("Failed to cache {key}: {reason}")]
    Install { key: String, reason: String },

    #[error("No installed generation to activate")]
    NotInstalled,

    #[error("Cache agent is no longer running")]
    AgentStopped,

    #[error("Failed to build cache agent HTTP client: {0}")]
    Client(String),
}
