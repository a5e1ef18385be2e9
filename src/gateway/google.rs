//! Stored Google OAuth token with refresh.
//!
//! The token file is provisioned once out of band and holds `token`,
//! `refresh_token`, `token_uri`, `client_id`, `client_secret`, `scopes` and
//! `expiry`. Expired tokens are refreshed through `token_uri` and written back
//! with owner-only permissions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{check_status, http_client, GatewayError};
use crate::credentials::restrict_to_owner;

/// Tokens expiring within this many seconds are refreshed early.
const EXPIRY_SKEW_SECS: i64 = 60;

/// On-disk token format.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// Current access token.
    pub token: String,
    /// Long-lived refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token endpoint.
    pub token_uri: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Granted scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Expiry, RFC 3339 or naive ISO 8601 in UTC.
    #[serde(default)]
    pub expiry: Option<String>,
}

impl std::fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredToken")
            .field("token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl StoredToken {
    /// Parsed expiry. Unparseable values count as expired.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.expiry.as_deref()?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            Ok(naive) => Some(naive.and_utc()),
            Err(_) => Some(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// Whether the token must be refreshed before use at `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(at) => {
                let skew = chrono::Duration::seconds(EXPIRY_SKEW_SECS);
                at <= now.checked_add_signed(skew).unwrap_or(now)
            }
            None => false,
        }
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Loads, refreshes and persists one token file.
pub struct GoogleTokenManager {
    path: PathBuf,
    client: reqwest::Client,
    refresh_lock: Mutex<()>,
}

impl GoogleTokenManager {
    /// Manage the token stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            client: http_client(),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Return a valid access token, refreshing it first if it has expired.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Auth` when the token file is missing or invalid
    /// or has no refresh token, and transport or status errors from refresh.
    pub async fn access_token(&self) -> Result<String, GatewayError> {
        let _guard = self.refresh_lock.lock().await;
        let mut stored = self.load()?;

        if !stored.needs_refresh(Utc::now()) {
            return Ok(stored.token);
        }

        info!(path = %self.path.display(), "Google token expired, refreshing");
        let refresh_token = stored.refresh_token.clone().ok_or_else(|| {
            GatewayError::Auth(format!(
                "token at {} has expired and has no refresh token",
                self.path.display()
            ))
        })?;

        let params = [
            ("client_id", stored.client_id.as_str()),
            ("client_secret", stored.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self
            .client
            .post(&stored.token_uri)
            .form(&params)
            .send()
            .await?;
        let body = check_status(response, &[200]).await?;
        let refreshed: RefreshResponse =
            serde_json::from_str(&body).map_err(|e| GatewayError::Parse(e.to_string()))?;

        stored.token = refreshed.access_token;
        stored.expiry = refreshed
            .expires_in
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .map(|at| at.to_rfc3339());
        self.save(&stored)?;
        debug!(path = %self.path.display(), "Google token refreshed");

        Ok(stored.token)
    }

    fn load(&self) -> Result<StoredToken, GatewayError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            GatewayError::Auth(format!(
                "cannot read token at {} ({e}); provision one with the OAuth consent flow",
                self.path.display()
            ))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            GatewayError::Auth(format!("invalid token at {}: {e}", self.path.display()))
        })
    }

    fn save(&self, token: &StoredToken) -> Result<(), GatewayError> {
        let json = serde_json::to_string_pretty(token)
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| {
            GatewayError::Auth(format!("cannot write token at {}: {e}", self.path.display()))
        })?;
        restrict_to_owner(&self.path)
            .map_err(|e| GatewayError::Auth(e.to_string()))
    }
}

/// One [`GoogleTokenManager`] per token file.
///
/// Gateways pointed at the same file get the same manager, so a refresh and
/// its write-back happen under a single lock.
#[derive(Default)]
pub struct TokenManagers {
    by_path: BTreeMap<PathBuf, Arc<GoogleTokenManager>>,
}

impl TokenManagers {
    /// The manager for `path`, created on first use.
    pub fn for_path(&mut self, path: &Path) -> Arc<GoogleTokenManager> {
        let manager = self
            .by_path
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(GoogleTokenManager::new(path)));
        Arc::clone(manager)
    }

    /// Number of distinct token files in use.
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Whether no manager has been created yet.
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}
