//! Google side of photopick: OAuth sign-in, the credential bundle and its
//! refresher, and the Photos Picker session API.
//!
//! [`PickerSessions`] is the entry point for session work. It is generic over
//! a [`CredentialSource`], normally [`StoredCredentials`], which loads the
//! bundle from disk and refreshes it when it has expired.

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod oauth;
pub mod refresh;
pub mod session;
pub mod tokens;

#[cfg(test)]
mod test_support;

pub use config::{OAuthCredentials, PickerConfig};
pub use credentials::{BoxFuture, CredentialSource, StaticCredentials, StoredCredentials};
pub use error::{PickerError, PickerErrorCode, PickerResult};
pub use oauth::OAuthClient;
pub use refresh::refresh_credentials;
pub use session::{CreatedSession, MediaItemPage, PickerSessions, SessionStatus};
pub use tokens::{RefreshedToken, TokenInfo, TokenStorage};
