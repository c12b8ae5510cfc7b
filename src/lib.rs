// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trip Planner: offline-capable trip planning client
//!
//! This crate ingests geo-tagged stops, asks a remote route service to order
//! them, saves trips to a remote store and keeps the application usable
//! offline through a background cache agent.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

use config::Config;
use error::CacheError;
use services::{
    AgentConfig, ApiClient, AuthService, CacheAgent, CacheAgentHandle, CacheStore,
    CredentialStore, HistoryManager, HostEnvironment, NotificationSink, RenderSink, TripManager,
};
use std::sync::Arc;

/// Everything one application session owns.
///
/// There is no global current trip; independent contexts can run side by
/// side.
pub struct PlannerContext {
    pub config: Config,
    pub api: ApiClient,
    pub auth: AuthService,
    pub trips: TripManager,
    pub history: HistoryManager,
    pub cache: Option<CacheAgentHandle>,
}

impl PlannerContext {
    /// Context talking straight to the network.
    pub fn new(
        config: Config,
        credentials: CredentialStore,
        notifier: Arc<dyn NotificationSink>,
        renderer: Arc<dyn RenderSink>,
    ) -> anyhow::Result<Self> {
        let api = ApiClient::new(&config, credentials)?;
        Ok(Self::assemble(config, api, None, notifier, renderer))
    }

    /// Context whose read-only calls go through a cache agent backed by
    /// `store`. The agent is started but not installed.
    pub fn with_cache(
        config: Config,
        credentials: CredentialStore,
        store: CacheStore,
        host: Arc<dyn HostEnvironment>,
        notifier: Arc<dyn NotificationSink>,
        renderer: Arc<dyn RenderSink>,
    ) -> anyhow::Result<Self> {
        let agent_config = AgentConfig::from_config(&config)?;
        let agent = CacheAgent::spawn(agent_config, store, host)?;
        let api = ApiClient::new(&config, credentials)?.with_cache_agent(agent.clone());
        Ok(Self::assemble(config, api, Some(agent), notifier, renderer))
    }

    fn assemble(
        config: Config,
        api: ApiClient,
        cache: Option<CacheAgentHandle>,
        notifier: Arc<dyn NotificationSink>,
        renderer: Arc<dyn RenderSink>,
    ) -> Self {
        Self {
            auth: AuthService::new(api.clone(), notifier.clone()),
            trips: TripManager::new(api.clone(), notifier.clone(), renderer),
            history: HistoryManager::new(api.clone(), notifier),
            config,
            api,
            cache,
        }
    }

    /// Install and activate the offline cache, if one is attached.
    pub async fn prepare_offline(&self) -> Result<(), CacheError> {
        match &self.cache {
            Some(agent) => agent.install_and_activate().await,
            None => Ok(()),
        }
    }
}
