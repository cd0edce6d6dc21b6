//! Session authentication against the Yggdrasil service, plus the
//! on-disk credential cache.
//!
//! The proxy needs three things from the auth service: a session token
//! for the account, a liveness check for a cached token (concurrent
//! logins from a real client invalidate it at any time), and the
//! session-server join call made during the encryption handshake.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

const AUTH_SERVER: &str = "https://authserver.mojang.com";
const SESSION_SERVER: &str = "https://sessionserver.mojang.com";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authentication rejected: {0}")]
    Rejected(String),
    #[error("no stored credentials")]
    NotFound,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_token: String,
    pub client_token: String,
    pub selected_profile: Profile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    #[serde(default)]
    error_message: String,
}

pub struct SessionService {
    http: reqwest::Client,
    auth_server: String,
    session_server: String,
}

impl SessionService {
    pub fn new() -> Self {
        Self::with_endpoints(AUTH_SERVER, SESSION_SERVER)
    }

    pub fn with_endpoints(auth_server: &str, session_server: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth_server: auth_server.to_owned(),
            session_server: session_server.to_owned(),
        }
    }

    /// Exchanges a username/password for a session token.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Credentials, AuthError> {
        let payload = serde_json::json!({
            "agent": { "name": "Minecraft", "version": 1 },
            "username": username,
            "password": password,
            "clientToken": Uuid::new_v4().to_string(),
        });
        let response = self
            .http
            .post(format!("{}/authenticate", self.auth_server))
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AuthError::Rejected(Self::error_message(response).await));
        }
        Ok(response.json().await?)
    }

    /// Whether the token is still usable for joins.
    pub async fn validate(&self, credentials: &Credentials) -> Result<bool, AuthError> {
        let payload = serde_json::json!({
            "accessToken": credentials.access_token,
            "clientToken": credentials.client_token,
        });
        let response = self
            .http
            .post(format!("{}/validate", self.auth_server))
            .json(&payload)
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    /// Announces to the session server that this token is joining the
    /// server identified by `server_hash` (see `crypto::server_hash`).
    pub async fn join(&self, server_hash: &str, credentials: &Credentials) -> Result<(), AuthError> {
        let payload = serde_json::json!({
            "accessToken": credentials.access_token,
            "selectedProfile": credentials.selected_profile.id,
            "serverId": server_hash,
        });
        let response = self
            .http
            .post(format!("{}/session/minecraft/join", self.session_server))
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AuthError::Rejected(Self::error_message(response).await));
        }
        Ok(())
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorResponse>().await {
            Ok(body) if !body.error_message.is_empty() => body.error_message,
            _ => format!("http status {status}"),
        }
    }
}

impl Default for SessionService {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON-file cache for the last known good credentials.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<Credentials, AuthError> {
        let data = match fs_err::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::NotFound)
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn save(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let data = serde_json::to_vec_pretty(credentials)?;
        fs_err::write(&self.path, data)?;
        Ok(())
    }

    pub fn delete(&self) -> Result<(), AuthError> {
        match fs_err::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
