// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod api;
pub mod auth;
pub mod cache_agent;
pub mod cache_store;
pub mod history;
pub mod host;
pub mod ingest;
pub mod notify;
pub mod render;
pub mod trips;

pub use api::{ApiClient, ApiRequest, ApiResponse, CallFailure};
pub use auth::{AuthService, CredentialStore};
pub use cache_agent::{
    AgentConfig, AgentState, CacheAgent, CacheAgentHandle, ClickOutcome, Destination,
    InterceptedRequest,
};
pub use cache_store::{CacheStore, Generation};
pub use history::HistoryManager;
pub use host::{ClientView, HostEnvironment, InMemoryHost};
pub use ingest::{ingest, RawTable};
pub use notify::{NoticeLevel, NotificationSink, TracingNotifier};
pub use render::{NullRenderer, RenderSink, RouteView};
pub use trips::TripManager;
