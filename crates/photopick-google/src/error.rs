//! Error types for Picker API and OAuth operations.
//!
//! Every failure talking to Google is a [`PickerError`] carrying a
//! [`PickerErrorCode`]. The code drives control flow (the poll loop treats
//! [`PickerErrorCode::SelectionNotYetComplete`] as "keep waiting", the CLI
//! asks the user to sign in again on [`PickerErrorCode::AuthenticationRequired`]),
//! while the message is passed through from upstream where there is one.

use std::fmt;
use thiserror::Error;

/// The category of a picker error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickerErrorCode {
    /// No credential, an expired one that could not be refreshed, or a 401.
    AuthenticationRequired,
    /// Upstream refused access (403).
    Forbidden,
    /// Too many requests (429).
    RateLimited,
    /// The session id is unknown or expired (404). Terminal for that id.
    SessionNotFound,
    /// The user has not finished picking yet. Only session reads report this,
    /// from an upstream precondition failure.
    SelectionNotYetComplete,
    /// Any other non-success upstream response.
    UpstreamApi,
    /// Transport failure: connect, DNS, TLS, request timeout.
    Network,
    /// The local poll deadline elapsed before the selection completed.
    Timeout,
    /// Upstream answered with something we could not parse.
    InvalidResponse,
    /// Missing or invalid local configuration.
    Configuration,
    /// Unexpected local state.
    Internal,
}

impl PickerErrorCode {
    /// Returns true if the same request may succeed when repeated later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::RateLimited)
    }

    /// Returns a stable snake_case name for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "authentication_required",
            Self::Forbidden => "forbidden",
            Self::RateLimited => "rate_limited",
            Self::SessionNotFound => "session_not_found",
            Self::SelectionNotYetComplete => "selection_not_yet_complete",
            Self::UpstreamApi => "upstream_api",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::InvalidResponse => "invalid_response",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for PickerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed user-facing text for the statuses the UI handles specially.
pub const MESSAGE_AUTH_REQUIRED: &str = "Your Google sign-in has expired. Please sign in again.";
pub const MESSAGE_FORBIDDEN: &str =
    "Access to Google Photos was denied. Check the permissions you granted.";
pub const MESSAGE_RATE_LIMITED: &str =
    "Too many requests to Google Photos. Please wait a moment and try again.";
pub const MESSAGE_SESSION_NOT_FOUND: &str =
    "The picker session has expired or no longer exists. Please start a new selection.";
pub const MESSAGE_TIMEOUT: &str = "Selecting photos took too long. Please try again.";

/// An error from the picker proxy, the token refresher, or the OAuth flow.
#[derive(Debug, Error)]
pub struct PickerError {
    code: PickerErrorCode,
    message: String,
    /// HTTP status of the upstream response, when there was one.
    http_status: Option<u16>,
    precondition_failed: bool,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PickerError {
    /// Creates a new error with the given code and message.
    pub fn new(code: PickerErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            http_status: None,
            precondition_failed: false,
            source: None,
        }
    }

    pub fn authentication_required(message: impl Into<String>) -> Self {
        Self::new(PickerErrorCode::AuthenticationRequired, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(PickerErrorCode::Forbidden, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(PickerErrorCode::RateLimited, message)
    }

    pub fn session_not_found(message: impl Into<String>) -> Self {
        Self::new(PickerErrorCode::SessionNotFound, message)
    }

    pub fn not_yet_complete(message: impl Into<String>) -> Self {
        Self::new(PickerErrorCode::SelectionNotYetComplete, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(PickerErrorCode::UpstreamApi, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PickerErrorCode::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(PickerErrorCode::Timeout, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(PickerErrorCode::InvalidResponse, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(PickerErrorCode::Configuration, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(PickerErrorCode::Internal, message)
    }

    /// Classifies a non-success upstream response.
    ///
    /// `upstream_status` is the `error.status` string from Google's error body
    /// (e.g. `FAILED_PRECONDITION`), when present. A precondition failure is a
    /// generic upstream error here; session reads reinterpret it with
    /// [`PickerError::into_not_yet_complete`].
    pub fn from_http_status(
        http_status: u16,
        upstream_status: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        let precondition_failed =
            upstream_status == Some("FAILED_PRECONDITION") || http_status == 412;
        let code = match http_status {
            _ if precondition_failed => PickerErrorCode::UpstreamApi,
            401 => PickerErrorCode::AuthenticationRequired,
            403 => PickerErrorCode::Forbidden,
            404 => PickerErrorCode::SessionNotFound,
            429 => PickerErrorCode::RateLimited,
            _ => PickerErrorCode::UpstreamApi,
        };
        let mut err = Self::new(code, message).with_http_status(http_status);
        err.precondition_failed = precondition_failed;
        err
    }

    /// Reclassifies an upstream precondition failure as
    /// [`PickerErrorCode::SelectionNotYetComplete`]. Other errors pass through.
    pub fn into_not_yet_complete(mut self) -> Self {
        if self.precondition_failed {
            self.code = PickerErrorCode::SelectionNotYetComplete;
        }
        self
    }

    /// Records the upstream HTTP status.
    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Sets the source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> PickerErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    /// Returns true if upstream rejected the request with a failed precondition.
    pub fn is_precondition_failure(&self) -> bool {
        self.precondition_failed
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable() || self.http_status.is_some_and(|s| s >= 500)
    }

    /// Returns true if the user has to sign in again before anything else works.
    pub fn requires_reauth(&self) -> bool {
        self.code == PickerErrorCode::AuthenticationRequired
    }

    /// Text suitable for showing to the user.
    ///
    /// Authentication, permission, rate-limit, not-found and timeout errors map
    /// to fixed strings; everything else passes the upstream message through.
    pub fn user_message(&self) -> String {
        match self.code {
            PickerErrorCode::AuthenticationRequired => MESSAGE_AUTH_REQUIRED.to_string(),
            PickerErrorCode::Forbidden => MESSAGE_FORBIDDEN.to_string(),
            PickerErrorCode::RateLimited => MESSAGE_RATE_LIMITED.to_string(),
            PickerErrorCode::SessionNotFound => MESSAGE_SESSION_NOT_FOUND.to_string(),
            PickerErrorCode::Timeout => MESSAGE_TIMEOUT.to_string(),
            _ => self.message.clone(),
        }
    }
}

impl fmt::Display for PickerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(status) = self.http_status {
            write!(f, " (HTTP {})", status)?;
        }
        Ok(())
    }
}

/// A specialized Result type for picker operations.
pub type PickerResult<T> = Result<T, PickerError>;
