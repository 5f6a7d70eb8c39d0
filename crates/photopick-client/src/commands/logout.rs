//! Sign-out command.

use photopick_google::TokenStorage;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Deletes the stored credential bundle.
///
/// Needs no client credentials. An unreadable token file is removed too.
pub fn logout(config: &ClientConfig) -> ClientResult<()> {
    let storage = TokenStorage::new(config.token_path());
    if !storage.path().exists() {
        println!("Not signed in.");
        return Ok(());
    }

    storage.clear()?;
    info!(path = %storage.path().display(), "credential bundle removed");
    println!("Signed out of Google Photos.");
    Ok(())
}
