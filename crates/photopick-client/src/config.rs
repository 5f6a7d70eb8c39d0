//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/photopick/config.toml` by default.
//!
//! Credential values (`client_id`, `client_secret`) support secret references:
//! - `pass::path/in/store` resolved via `pass show`
//! - `env::VAR_NAME` resolved from the environment
//! - plain text used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use photopick_core::GalleryFormat;
use photopick_flow::FlowSettings;
use photopick_google::{OAuthCredentials, PickerConfig};
use serde::{Deserialize, Serialize};

/// Configuration for the photopick client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Google sign-in settings.
    pub google: Option<GoogleSettings>,

    /// Debug mode.
    pub debug: bool,

    /// Picker flow timing and browser behaviour.
    pub picker: PickerSettings,

    /// Gallery output settings.
    pub display: DisplaySettings,
}

/// Picker flow settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerSettings {
    /// Give up waiting for a selection after this many seconds, unless the
    /// session advertises its own timeout.
    pub default_timeout_secs: u64,

    /// Pause between the selection completing and printing the gallery.
    pub navigation_delay_ms: u64,

    /// How often to check whether the picker window was closed.
    pub window_check_secs: u64,

    /// Open the picker in the default browser. When false, the URL is printed.
    pub open_browser: bool,

    /// Per-request HTTP timeout for Google APIs.
    pub request_timeout_secs: u64,
}

impl Default for PickerSettings {
    fn default() -> Self {
        let flow = FlowSettings::default();
        Self {
            default_timeout_secs: flow.default_timeout.as_secs(),
            navigation_delay_ms: flow.navigation_delay.as_millis() as u64,
            window_check_secs: flow.window_check_interval.as_secs(),
            open_browser: true,
            request_timeout_secs: PickerConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl PickerSettings {
    /// Converts to the flow's timing knobs.
    pub fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            default_timeout: Duration::from_secs(self.default_timeout_secs),
            navigation_delay: Duration::from_millis(self.navigation_delay_ms),
            window_check_interval: Duration::from_secs(self.window_check_secs.max(1)),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.default_timeout_secs == 0 {
            return Err("picker.default_timeout_secs must be greater than zero".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("picker.request_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Gallery output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Default gallery format (`tty` or `json`).
    pub format: GalleryFormat,
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photopick")
    }

    /// Builds the Google configuration from the `[google]` and `[picker]`
    /// sections.
    pub fn picker_config(&self) -> Result<PickerConfig, String> {
        let google = self.google.clone().unwrap_or_default();
        let config = google
            .to_picker_config()?
            .with_timeout(Duration::from_secs(self.picker.request_timeout_secs));
        config.validate()?;
        Ok(config)
    }

    /// Where the credential bundle lives, without resolving credentials.
    pub fn token_path(&self) -> PathBuf {
        self.google
            .as_ref()
            .and_then(|g| g.token_path.clone())
            .unwrap_or_else(PickerConfig::default_token_path)
    }
}

/// Google sign-in settings.
///
/// Credentials (`client_id`, `client_secret`) are stored inline and support
/// secret references (`pass::…`, `env::…`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GoogleSettings {
    /// OAuth client ID (supports `pass::` and `env::` prefixes).
    pub client_id: Option<String>,

    /// OAuth client secret (supports `pass::` and `env::` prefixes).
    pub client_secret: Option<String>,

    /// Path to the stored credential bundle.
    pub token_path: Option<PathBuf>,
}

impl GoogleSettings {
    /// Resolves credentials and builds a `PickerConfig`.
    pub fn to_picker_config(&self) -> Result<PickerConfig, String> {
        let credentials = self.resolve_credentials()?;
        credentials.validate().map_err(|e| e.to_string())?;

        let mut config = PickerConfig::new(credentials);
        if let Some(ref path) = self.token_path {
            config = config.with_token_path(path);
        }
        Ok(config)
    }

    /// Resolves Google OAuth credentials from inline fields.
    ///
    /// Both `client_id` and `client_secret` must be set. Each value is passed
    /// through `secret::resolve()` to expand `pass::` and `env::` references.
    pub(crate) fn resolve_credentials(&self) -> Result<OAuthCredentials, String> {
        let raw_id = self.client_id.as_deref().ok_or_else(|| {
            format!(
                "Google credentials not found. Add to {}:\n  \
                 [google]\n  \
                 client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
                 client_secret = \"YOUR_SECRET\"\n\n  \
                 Or run: photopick auth google --credentials-file <path>",
                ClientConfig::default_path().display()
            )
        })?;
        let raw_secret = self
            .client_secret
            .as_deref()
            .ok_or("client_secret is missing from [google] section in config.toml")?;

        let client_id = crate::secret::resolve(raw_id)
            .map_err(|e| format!("failed to resolve client_id: {}", e))?;
        let client_secret = crate::secret::resolve(raw_secret)
            .map_err(|e| format!("failed to resolve client_secret: {}", e))?;

        Ok(OAuthCredentials::new(client_id, client_secret))
    }
}
