// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background cache agent: lifecycle, serving policy and push relay.

use reqwest::{Method, Url};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use trip_planner::error::{CacheError, NetworkError};
use trip_planner::models::StoredResponse;
use trip_planner::services::{
    AgentConfig, AgentState, ApiClient, CacheAgent, CacheAgentHandle, CacheStore, ClickOutcome,
    CredentialStore, Destination, Generation, HostEnvironment, InMemoryHost, InterceptedRequest,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

const MANIFEST: &[&str] = &["/index.html", "/js/main.js"];

/// A dedicated server, so dropping it takes the origin offline.
async fn asset_server() -> MockServer {
    let server = MockServer::builder().start().await;
    Mock::given(method("GET"))
        .and(path("/index.html"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>planner</html>", "text/html"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/js/main.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("main();"))
        .mount(&server)
        .await;
    server
}

fn spawn_agent(
    base: &str,
    store: CacheStore,
    manifest: &[&str],
) -> (CacheAgentHandle, Arc<InMemoryHost>) {
    let config = AgentConfig::from_config(&common::test_config(base))
        .unwrap()
        .with_manifest(manifest.iter().copied());
    let host = Arc::new(InMemoryHost::new());
    let agent = CacheAgent::spawn(config, store, host.clone()).unwrap();
    (agent, host)
}

fn get(base: &str, path: &str) -> InterceptedRequest {
    InterceptedRequest::get(Url::parse(&format!("{}{}", base, path)).unwrap())
}

fn document(base: &str, path: &str) -> InterceptedRequest {
    InterceptedRequest {
        destination: Destination::Document,
        ..get(base, path)
    }
}

fn old_generation(store: &CacheStore) -> Generation {
    let old = Generation::new("planner-cache-v1");
    store
        .install(
            &old,
            vec![(
                "GET /index.html".to_string(),
                StoredResponse {
                    status: 200,
                    content_type: Some("text/html".to_string()),
                    body: b"<html>old</html>".to_vec(),
                },
            )],
        )
        .unwrap();
    old
}

#[tokio::test]
async fn test_activation_leaves_exactly_one_generation() {
    let server = asset_server().await;
    let store = CacheStore::temporary().unwrap();
    old_generation(&store);

    let (agent, host) = spawn_agent(&server.uri(), store.clone(), MANIFEST);
    let view = host.open_view("/index.html");
    assert_eq!(agent.state().await, AgentState::Installing);

    // The previous generation serves while the new one installs
    let before = agent.fetch(get(&server.uri(), "/index.html")).await.unwrap();
    assert_eq!(before.body, b"<html>old</html>");

    assert_eq!(agent.install().await.unwrap(), 2);
    assert_eq!(agent.state().await, AgentState::Activating);

    let purged = agent.activate().await.unwrap();
    assert_eq!(purged, vec!["planner-cache-v1".to_string()]);
    assert_eq!(agent.state().await, AgentState::Serving);
    assert_eq!(store.generations(), vec![Generation::new("planner-cache-v2")]);

    let after = agent.fetch(get(&server.uri(), "/index.html")).await.unwrap();
    assert_eq!(after.body, b"<html>planner</html>");
    assert_eq!(after.content_type.as_deref(), Some("text/html"));

    let views = host.client_views();
    assert_eq!(views[0].id, view);
    assert_eq!(views[0].controller.as_deref(), Some("planner-cache-v2"));
}

#[tokio::test]
async fn test_cache_hit_issues_no_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>planner</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let (agent, _) = spawn_agent(&server.uri(), CacheStore::temporary().unwrap(), &["/index.html"]);
    agent.install_and_activate().await.unwrap();

    let first = agent.fetch(get(&server.uri(), "/index.html")).await.unwrap();
    let second = agent.fetch(get(&server.uri(), "/index.html")).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_miss_is_stored_and_served_offline() {
    let server = asset_server().await;
    Mock::given(method("GET"))
        .and(path("/routes/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "history": [] })))
        .expect(1)
        .mount(&server)
        .await;
    let base = server.uri();

    let (agent, _) = spawn_agent(&base, CacheStore::temporary().unwrap(), MANIFEST);
    agent.install_and_activate().await.unwrap();

    let fetched = agent.fetch(get(&base, "/routes/history")).await.unwrap();
    let cached = agent.fetch(get(&base, "/routes/history")).await.unwrap();
    assert_eq!(fetched.body, cached.body);

    drop(server);

    let offline = agent.fetch(get(&base, "/routes/history")).await.unwrap();
    assert_eq!(offline.body, fetched.body);
}

#[tokio::test]
async fn test_offline_document_falls_back_to_landing_page() {
    let server = asset_server().await;
    let base = server.uri();
    let (agent, _) = spawn_agent(&base, CacheStore::temporary().unwrap(), MANIFEST);
    agent.install_and_activate().await.unwrap();
    drop(server);

    let page = agent.fetch(document(&base, "/history.html")).await.unwrap();
    assert_eq!(page.body, b"<html>planner</html>");

    let err = agent.fetch(get(&base, "/routes/history")).await.unwrap_err();
    assert!(matches!(err, NetworkError::Unreachable(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_failed_install_keeps_previous_generation() {
    let server = asset_server().await;
    Mock::given(method("GET"))
        .and(path("/js/missing.js"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let store = CacheStore::temporary().unwrap();
    let old = old_generation(&store);

    let (agent, _) = spawn_agent(
        &server.uri(),
        store.clone(),
        &["/index.html", "/js/missing.js", "/js/main.js"],
    );

    let err = agent.install().await.unwrap_err();
    match err {
        CacheError::Install { key, .. } => assert_eq!(key, "GET /js/missing.js"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!store.contains(&Generation::new("planner-cache-v2")));
    assert_eq!(store.generations(), vec![old]);
    assert_eq!(agent.state().await, AgentState::Serving);

    assert!(matches!(agent.activate().await, Err(CacheError::NotInstalled)));
    let served = agent.fetch(get(&server.uri(), "/index.html")).await.unwrap();
    assert_eq!(served.body, b"<html>old</html>");
}

#[tokio::test]
async fn test_first_install_failure_leaves_nothing_servable() {
    let server = MockServer::start().await;
    let (agent, _) = spawn_agent(&server.uri(), CacheStore::temporary().unwrap(), MANIFEST);

    assert!(agent.install().await.is_err());
    assert_eq!(agent.state().await, AgentState::Installing);
}

#[tokio::test]
async fn test_writes_pass_through_uncached() {
    let server = asset_server().await;
    Mock::given(method("POST"))
        .and(path("/routes/save"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    let base = server.uri();

    let (agent, _) = spawn_agent(&base, CacheStore::temporary().unwrap(), MANIFEST);
    agent.install_and_activate().await.unwrap();

    for _ in 0..2 {
        let request = InterceptedRequest {
            method: Method::POST,
            body: Some(br#"{"trip":{}}"#.to_vec()),
            ..get(&base, "/routes/save")
        };
        assert_eq!(agent.fetch(request).await.unwrap().status, 200);
        // Only successful responses are stored
        assert_eq!(agent.fetch(get(&base, "/auth/me")).await.unwrap().status, 401);
    }
}

#[tokio::test]
async fn test_fresh_read_prefers_network() {
    let server = asset_server().await;
    Mock::given(method("GET"))
        .and(path("/routes/history"))
        .respond_with(ResponseTemplate::new(200).set_body_string("v1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/routes/history"))
        .respond_with(ResponseTemplate::new(200).set_body_string("v2"))
        .mount(&server)
        .await;
    let base = server.uri();

    let (agent, _) = spawn_agent(&base, CacheStore::temporary().unwrap(), MANIFEST);
    agent.install_and_activate().await.unwrap();
    let fresh = |path: &str| InterceptedRequest {
        fresh: true,
        ..get(&base, path)
    };

    assert_eq!(agent.fetch(fresh("/routes/history")).await.unwrap().body, b"v1");
    assert_eq!(agent.fetch(fresh("/routes/history")).await.unwrap().body, b"v2");

    drop(server);
    assert_eq!(agent.fetch(fresh("/routes/history")).await.unwrap().body, b"v2");
}

#[tokio::test]
async fn test_response_from_replaced_generation_is_discarded() {
    let server = asset_server().await;
    Mock::given(method("GET"))
        .and(path("/routes/history"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "history": [] }))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    let base = server.uri();
    let store = CacheStore::temporary().unwrap();
    old_generation(&store);

    let (agent, _) = spawn_agent(&base, store.clone(), MANIFEST);
    let in_flight = {
        let agent = agent.clone();
        let request = get(&base, "/routes/history");
        tokio::spawn(async move { agent.fetch(request).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // v2 takes over while the miss fetched under v1 is still outstanding
    agent.install_and_activate().await.unwrap();
    assert_eq!(in_flight.await.unwrap().unwrap().status, 200);
    assert_eq!(agent.state().await, AgentState::Serving);

    let current = Generation::new("planner-cache-v2");
    assert_eq!(store.generations(), vec![current.clone()]);
    assert_eq!(store.len(&current).unwrap(), MANIFEST.len());
    assert!(store.get(&current, "GET /routes/history").unwrap().is_none());
}

#[tokio::test]
async fn test_restarted_agent_serves_installed_generation() {
    let server = asset_server().await;
    let store = CacheStore::temporary().unwrap();

    let (agent, _) = spawn_agent(&server.uri(), store.clone(), MANIFEST);
    agent.install_and_activate().await.unwrap();
    agent.shutdown().await;
    assert_eq!(agent.state().await, AgentState::Terminated);
    assert!(matches!(
        agent.fetch(get(&server.uri(), "/index.html")).await,
        Err(NetworkError::Unreachable(_))
    ));

    let (restarted, _) = spawn_agent(&server.uri(), store, MANIFEST);
    assert_eq!(restarted.state().await, AgentState::Serving);
}

#[tokio::test]
async fn test_push_relay_and_notification_click() {
    let server = asset_server().await;
    let base = server.uri();
    let (agent, host) = spawn_agent(&base, CacheStore::temporary().unwrap(), MANIFEST);

    let shown = agent
        .push(Some(
            br#"{"title":"Trip shared","body":"Ana shared a trip","url":"/history.html"}"#.to_vec(),
        ))
        .await
        .unwrap();
    assert_eq!(shown.title, "Trip shared");
    assert_eq!(shown.icon, "/favicon.ico");
    assert_eq!(host.notifications(), vec![shown.clone()]);

    let opened = agent.notification_clicked(shown.id).await.unwrap();
    let Some(ClickOutcome::Opened(view)) = opened else {
        panic!("expected a new view, got {:?}", opened);
    };
    assert!(host.notifications().is_empty());
    assert_eq!(host.client_views()[0].url, format!("{}/history.html", base));

    let again = agent
        .push(Some(br#"{"url":"/history.html"}"#.to_vec()))
        .await
        .unwrap();
    assert_eq!(again.title, "Planner");
    assert_eq!(
        agent.notification_clicked(again.id).await.unwrap(),
        Some(ClickOutcome::Focused(view))
    );
    assert_eq!(host.focused(), Some(view));

    // Unknown or already handled notifications do nothing
    assert_eq!(agent.notification_clicked(again.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_malformed_push_uses_defaults() {
    let server = asset_server().await;
    let (agent, _) = spawn_agent(&server.uri(), CacheStore::temporary().unwrap(), MANIFEST);

    let shown = agent.push(Some(b"not json".to_vec())).await.unwrap();
    assert_eq!(shown.title, "Planner");
    assert_eq!(shown.body, "New notification!");
    assert_eq!(shown.target_url, "/");

    let empty = agent.push(None).await.unwrap();
    assert_eq!(empty.target_url, "/");
    assert_ne!(empty.id, shown.id);
}

#[tokio::test]
async fn test_api_client_reads_through_agent() {
    let server = asset_server().await;
    Mock::given(method("GET"))
        .and(path("/routes/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "history": [{ "id": 3, "name": "Cached trip", "points": [] }]
        })))
        .mount(&server)
        .await;
    let base = server.uri();

    let (agent, _) = spawn_agent(&base, CacheStore::temporary().unwrap(), MANIFEST);
    agent.install_and_activate().await.unwrap();
    let api = ApiClient::new(&common::test_config(&base), CredentialStore::in_memory())
        .unwrap()
        .with_cache_agent(agent);

    assert_eq!(api.history().await.unwrap()[0].name(), "Cached trip");
    drop(server);
    assert_eq!(api.history().await.unwrap()[0].name(), "Cached trip");
}
