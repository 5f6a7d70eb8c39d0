//! The credential capability handed to the picker proxy.
//!
//! Proxy calls never reach for ambient token state. They are given a
//! [`CredentialSource`] and ask it for the current bundle on every call.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::PickerConfig;
use crate::error::{PickerError, PickerResult};
use crate::oauth::OAuthClient;
use crate::refresh::refresh_credentials;
use crate::tokens::{TokenInfo, TokenStorage};

/// A boxed future for object-safe async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Supplies the current credential bundle, or `None` when signed out.
///
/// A returned bundle may carry the refresh error flag; callers check it.
pub trait CredentialSource: Send + Sync {
    fn current(&self) -> BoxFuture<'_, Option<TokenInfo>>;
}

/// Credentials backed by the on-disk token file, refreshed on demand.
pub struct StoredCredentials {
    config: PickerConfig,
    storage: TokenStorage,
    oauth: OAuthClient,
    /// Serializes refreshes so concurrent callers make one token request.
    refresh_lock: Mutex<()>,
}

impl StoredCredentials {
    /// Loads any stored bundle. Does not start a sign-in.
    pub fn new(config: PickerConfig) -> PickerResult<Self> {
        config.validate().map_err(PickerError::configuration)?;

        let storage = TokenStorage::new(&config.token_path);
        if let Err(e) = storage.load() {
            warn!(error = %e, "ignoring unreadable token file");
        }
        let oauth = OAuthClient::new(&config)?;

        Ok(Self {
            config,
            storage,
            oauth,
            refresh_lock: Mutex::new(()),
        })
    }

    /// Runs the interactive browser sign-in and stores the result.
    pub async fn authenticate(&self) -> PickerResult<()> {
        info!("starting Google sign-in");
        let tokens = self
            .oauth
            .authorize(&self.config.scopes, self.config.loopback_port_range)
            .await?;
        self.storage.set(tokens)?;
        info!(path = ?self.storage.path(), "sign-in complete");
        Ok(())
    }

    /// Returns true if a bundle is stored that grants the configured scopes
    /// and has not failed a refresh.
    pub fn is_authenticated(&self) -> bool {
        !self.storage.needs_reauth(&self.config.scopes)
    }

    /// Destroys the stored bundle.
    pub fn sign_out(&self) -> PickerResult<()> {
        self.storage.clear()
    }

    pub fn storage(&self) -> &TokenStorage {
        &self.storage
    }

    pub fn config(&self) -> &PickerConfig {
        &self.config
    }

    async fn current_bundle(&self) -> Option<TokenInfo> {
        let bundle = self.storage.get()?;
        if !bundle.is_expired() || bundle.has_error() {
            return Some(bundle);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        let bundle = self.storage.get()?;
        if !bundle.is_expired() || bundle.has_error() {
            return Some(bundle);
        }

        let refreshed = refresh_credentials(&self.oauth, bundle).await;
        if refreshed.has_error() {
            self.storage.set_in_memory(refreshed.clone());
        } else if let Err(e) = self.storage.set(refreshed.clone()) {
            warn!(error = %e, "failed to persist refreshed tokens");
            self.storage.set_in_memory(refreshed.clone());
        }
        Some(refreshed)
    }
}

impl CredentialSource for StoredCredentials {
    fn current(&self) -> BoxFuture<'_, Option<TokenInfo>> {
        Box::pin(self.current_bundle())
    }
}

/// A fixed bundle, for callers that manage tokens themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    bundle: Option<TokenInfo>,
}

impl StaticCredentials {
    pub fn new(bundle: TokenInfo) -> Self {
        Self {
            bundle: Some(bundle),
        }
    }

    /// A source that is never signed in.
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// A never-expiring bundle holding just an access token.
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        Self::new(TokenInfo::new(access_token, None, None, Vec::new()))
    }
}

impl CredentialSource for StaticCredentials {
    fn current(&self) -> BoxFuture<'_, Option<TokenInfo>> {
        let bundle = self.bundle.clone();
        Box::pin(async move { bundle })
    }
}
