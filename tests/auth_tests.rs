// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login, registration and logout against a mocked auth endpoint.

use serde_json::json;
use std::sync::Arc;
use trip_planner::error::AuthError;
use trip_planner::services::{ApiClient, AuthService, CredentialStore, NoticeLevel};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

fn auth_service(
    server: &MockServer,
    credentials: CredentialStore,
) -> (AuthService, Arc<common::RecordingNotifier>) {
    let api = ApiClient::new(&common::test_config(&server.uri()), credentials).unwrap();
    let notifier = Arc::new(common::RecordingNotifier::default());
    (AuthService::new(api, notifier.clone()), notifier)
}

#[tokio::test]
async fn test_login_persists_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_partial_json(json!({ "email": "ana@example.com", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "token_type": "bearer",
            "username": "Ana"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "username": "Ana" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let credential_path = dir.path().join("credential");
    let (auth, notifier) = auth_service(&server, CredentialStore::load(&credential_path).unwrap());

    auth.login("ana@example.com", "pw").await.unwrap();

    assert_eq!(std::fs::read_to_string(&credential_path).unwrap(), "tok-1");
    assert_eq!(
        notifier.last(),
        Some((NoticeLevel::Success, "Welcome, Ana!".to_string()))
    );
    assert_eq!(auth.profile().await.unwrap()["username"], "Ana");
}

#[tokio::test]
async fn test_invalid_email_never_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (auth, notifier) = auth_service(&server, CredentialStore::in_memory());
    let err = auth.login("not-an-email", "pw").await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidInput(_)));
    assert_eq!(notifier.last().unwrap().0, NoticeLevel::Error);
}

#[tokio::test]
async fn test_login_without_token_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "username": "Ana" })))
        .mount(&server)
        .await;

    let credentials = CredentialStore::in_memory();
    let (auth, _) = auth_service(&server, credentials.clone());

    let err = auth.login("ana@example.com", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::MissingToken));
    assert!(!credentials.is_authenticated());
}

#[tokio::test]
async fn test_register() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_partial_json(json!({ "username": "Ana", "email": "ana@example.com" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let (auth, notifier) = auth_service(&server, CredentialStore::in_memory());
    auth.register("Ana", "ana@example.com", "pw").await.unwrap();
    assert_eq!(notifier.last().unwrap().0, NoticeLevel::Success);

    assert!(matches!(
        auth.register("", "ana@example.com", "pw").await,
        Err(AuthError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_logout_clears_credential_even_if_server_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let credential_path = dir.path().join("credential");
    let credentials = CredentialStore::load(&credential_path).unwrap();
    credentials.set("tok-1").unwrap();
    let (auth, notifier) = auth_service(&server, credentials.clone());

    auth.logout().await.unwrap();

    assert!(!credentials.is_authenticated());
    assert!(!credential_path.exists());
    assert_eq!(notifier.last().unwrap().0, NoticeLevel::Info);
}
