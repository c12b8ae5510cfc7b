// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stored credential and the login/register/logout flow.
//!
//! The credential is an opaque bearer token issued by the remote store. It
//! is persisted as a single string so a restart keeps the session.

use crate::error::AuthError;
use crate::services::api::ApiClient;
use crate::services::notify::{NoticeLevel, NotificationSink};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use validator::Validate;

/// Bearer credential shared by every client clone.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    path: Option<PathBuf>,
    token: Arc<RwLock<Option<String>>>,
}

impl CredentialStore {
    /// Store that forgets the credential on exit.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store persisted at `path`. A missing file means no credential.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AuthError> {
        let path = path.as_ref().to_path_buf();
        let token = match fs::read_to_string(&path) {
            Ok(contents) => Some(contents.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), present = token.is_some(), "Loaded credential");
        Ok(Self {
            path: Some(path),
            token: Arc::new(RwLock::new(token)),
        })
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn set(&self, token: &str) -> Result<(), AuthError> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            write_private(path, token)?;
        }
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    pub fn clear(&self) -> Result<(), AuthError> {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Write `token` readable by the owner only.
fn write_private(path: &Path, token: &str) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.truncate(true).write(true).create(true);
    #[cfg(unix)]
    {
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // mode only applies on create; tighten a file left by an older run
    #[cfg(unix)]
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(token.as_bytes())?;
    file.flush()
}

#[derive(Debug, Validate)]
struct LoginInput {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    password: String,
}

#[derive(Debug, Validate)]
struct RegisterInput {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    password: String,
}

/// Session operations against the remote store.
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
    notifier: Arc<dyn NotificationSink>,
}

impl AuthService {
    pub fn new(api: ApiClient, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { api, notifier }
    }

    /// Log in and store the issued credential.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        LoginInput {
            email: email.to_string(),
            password: password.to_string(),
        }
        .validate()
        .map_err(|e| self.reject(AuthError::InvalidInput(e.to_string())))?;

        let response = self
            .api
            .login(email, password)
            .await
            .map_err(|e| self.reject(e.into()))?;
        let token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| self.reject(AuthError::MissingToken))?;

        self.api.credentials().set(&token)?;
        tracing::info!("Logged in");
        self.notifier.notify(
            NoticeLevel::Success,
            &format!("Welcome, {}!", response.username.as_deref().unwrap_or(email)),
        );
        Ok(())
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), AuthError> {
        RegisterInput {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
        .validate()
        .map_err(|e| self.reject(AuthError::InvalidInput(e.to_string())))?;

        self.api
            .register(name, email, password)
            .await
            .map_err(|e| self.reject(e.into()))?;
        self.notifier
            .notify(NoticeLevel::Success, "Registration successful! Please log in");
        Ok(())
    }

    /// Drop the local credential. The server is told first, best effort.
    pub async fn logout(&self) -> Result<(), AuthError> {
        if self.api.credentials().is_authenticated() {
            if let Err(e) = self.api.logout().await {
                tracing::warn!(error = %e, "Server logout failed, clearing local credential anyway");
            }
        }
        self.api.credentials().clear()?;
        self.notifier.notify(NoticeLevel::Info, "You have logged out");
        Ok(())
    }

    pub async fn profile(&self) -> Result<Value, AuthError> {
        Ok(self.api.me().await?)
    }

    fn reject(&self, err: AuthError) -> AuthError {
        self.notifier.notify(NoticeLevel::Error, &err.to_string());
        err
    }
}
