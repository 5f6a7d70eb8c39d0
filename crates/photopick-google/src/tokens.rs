//! Credential bundle storage.
//!
//! The bundle lives in memory behind a lock and is mirrored to a JSON file
//! with owner-only permissions. Only the token refresher and sign-in/sign-out
//! write to it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PickerError, PickerResult};

/// An OAuth credential bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The access token for API requests.
    pub access_token: String,

    /// The long-lived credential used to obtain new access tokens.
    pub refresh_token: Option<String>,

    /// When the access token expires. No safety margin is applied.
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    pub scopes: Vec<String>,

    /// When the tokens were last obtained or refreshed.
    pub last_refresh: DateTime<Utc>,

    /// Set when a refresh failed; the bundle must not be used until the
    /// user signs in again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The fields returned by a successful refresh-token exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Present only when the provider rotated the refresh token.
    pub refresh_token: Option<String>,
    pub expires_in_secs: Option<i64>,
}

impl TokenInfo {
    /// Creates a bundle from token endpoint response data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        let mut bundle = Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: None,
            scopes,
            last_refresh: now,
            error: None,
        };
        if let Some(secs) = expires_in_secs {
            match expiry_after(now, secs) {
                Some(expires_at) => bundle.expires_at = Some(expires_at),
                None => {
                    bundle.expires_at = Some(now);
                    bundle.mark_error(out_of_range_expiry(secs));
                }
            }
        }
        bundle
    }

    /// Builder: set an explicit expiry instant.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns true once the expiry instant has been reached.
    ///
    /// A bundle without an expiry never expires.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Returns true if a previous refresh failed.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Records a refresh failure. The access token is left as-is.
    pub fn mark_error(&mut self, reason: impl Into<String>) {
        self.error = Some(reason.into());
    }

    /// Applies a successful refresh.
    ///
    /// A rotated refresh token replaces the old one; otherwise the old one is
    /// kept. Clears any error flag.
    ///
    /// An expiry that cannot be represented counts as a failed refresh: the
    /// stale bundle is kept and the error flag set.
    pub fn apply_refresh(&mut self, refreshed: RefreshedToken) {
        let now = Utc::now();
        let expires_at = match refreshed.expires_in_secs {
            Some(secs) => match expiry_after(now, secs) {
                Some(expires_at) => Some(expires_at),
                None => {
                    self.mark_error(out_of_range_expiry(secs));
                    return;
                }
            },
            None => None,
        };
        self.access_token = refreshed.access_token;
        if let Some(rotated) = refreshed.refresh_token {
            self.refresh_token = Some(rotated);
        }
        self.expires_at = expires_at;
        self.last_refresh = now;
        self.error = None;
    }

    /// Returns true if the token has the required scopes.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Returns the time until the token expires, if known.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|expires_at| expires_at - Utc::now())
    }
}

fn expiry_after(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(secs).and_then(|lifetime| now.checked_add_signed(lifetime))
}

fn out_of_range_expiry(secs: i64) -> String {
    format!("token lifetime of {} seconds is out of range", secs)
}

/// File-backed credential bundle storage.
#[derive(Debug)]
pub struct TokenStorage {
    path: PathBuf,
    tokens: RwLock<Option<TokenInfo>>,
}

impl TokenStorage {
    /// Creates a storage at the given path. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tokens: RwLock::new(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<TokenInfo>> {
        self.tokens.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<TokenInfo>> {
        self.tokens.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Loads the bundle from disk into memory.
    ///
    /// Returns `Ok(false)` when there is no token file.
    pub fn load(&self) -> PickerResult<bool> {
        if !self.path.exists() {
            debug!(path = ?self.path, "no token file");
            return Ok(false);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            PickerError::configuration(format!("failed to read token file: {}", e))
        })?;

        let tokens: TokenInfo = serde_json::from_str(&content).map_err(|e| {
            PickerError::configuration(format!("failed to parse token file: {}", e))
        })?;

        info!(path = ?self.path, "loaded tokens");
        *self.write() = Some(tokens);
        Ok(true)
    }

    fn save(&self, tokens: &TokenInfo) -> PickerResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PickerError::configuration(format!("failed to create token directory: {}", e))
            })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(tokens)
            .map_err(|e| PickerError::internal(format!("failed to serialize tokens: {}", e)))?;

        write_private(&temp_path, content.as_bytes()).map_err(|e| {
            PickerError::configuration(format!("failed to write token file: {}", e))
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            PickerError::configuration(format!("failed to rename token file: {}", e))
        })?;

        debug!(path = ?self.path, "saved tokens");
        Ok(())
    }

    /// Returns a clone of the current bundle.
    pub fn get(&self) -> Option<TokenInfo> {
        self.read().clone()
    }

    /// Replaces the bundle and writes it to disk.
    pub fn set(&self, tokens: TokenInfo) -> PickerResult<()> {
        self.save(&tokens)?;
        *self.write() = Some(tokens);
        Ok(())
    }

    /// Replaces the in-memory bundle without touching the file.
    ///
    /// Used for the refresh error flag, which must not outlive the process.
    pub fn set_in_memory(&self, tokens: TokenInfo) {
        *self.write() = Some(tokens);
    }

    /// Removes the bundle from memory and disk.
    pub fn clear(&self) -> PickerResult<()> {
        *self.write() = None;
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                PickerError::configuration(format!("failed to remove token file: {}", e))
            })?;
            info!(path = ?self.path, "cleared tokens");
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a bundle is loaded, unexpired and error-free.
    pub fn has_valid_tokens(&self) -> bool {
        self.read()
            .as_ref()
            .is_some_and(|t| !t.is_expired() && !t.has_error())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.read()
            .as_ref()
            .is_some_and(|t| t.refresh_token.is_some())
    }

    /// Returns true if there is no bundle, or it lacks a required scope.
    pub fn needs_reauth(&self, required_scopes: &[String]) -> bool {
        match self.read().as_ref() {
            None => true,
            Some(tokens) => tokens.has_error() || !tokens.has_scopes(required_scopes),
        }
    }
}

/// Writes `contents` to a new file readable only by its owner, replacing any
/// leftover file at `path`.
#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::{ErrorKind, Write};
    use std::os::unix::fs::OpenOptionsExt;

    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => return Err(e),
        _ => {}
    }
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)
}
