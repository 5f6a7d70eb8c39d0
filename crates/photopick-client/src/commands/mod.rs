//! Subcommand implementations.

pub mod auth;
pub mod config;
pub mod logout;
pub mod pick;
pub mod session;

use photopick_google::{PickerSessions, StoredCredentials};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Session operations signed in with the stored credential bundle.
pub(crate) fn stored_sessions(
    config: &ClientConfig,
) -> ClientResult<PickerSessions<StoredCredentials>> {
    let picker_config = config.picker_config().map_err(ClientError::Config)?;
    let credentials = StoredCredentials::new(picker_config.clone())?;
    Ok(PickerSessions::new(&picker_config, credentials)?)
}
