//! Authentication commands.

use std::path::{Path, PathBuf};

use photopick_google::{OAuthCredentials, PickerConfig, StoredCredentials};
use tracing::{info, warn};

use crate::config::{ClientConfig, GoogleSettings};
use crate::error::{ClientError, ClientResult};

/// Where the OAuth client credentials came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CredentialOrigin {
    /// `--client-id`/`--client-secret` or `--credentials-file`.
    Cli,
    /// Already in `config.toml`.
    Config,
}

/// Signs in to Google Photos with the loopback PKCE flow.
///
/// Credentials given on the command line are written to `config_path` once
/// they are known to be usable, so later commands find them.
pub async fn google(
    client_id: Option<String>,
    client_secret: Option<String>,
    credentials_file: Option<PathBuf>,
    force: bool,
    config: &ClientConfig,
    config_path: &Path,
) -> ClientResult<()> {
    let (credentials, origin) = resolve_google_credentials(
        client_id,
        client_secret,
        credentials_file,
        config.google.as_ref(),
    )?;
    credentials
        .validate()
        .map_err(|e| ClientError::Config(format!("invalid Google credentials: {}", e)))?;

    let mut picker_config = PickerConfig::new(credentials.clone());
    if let Some(path) = config.google.as_ref().and_then(|g| g.token_path.as_ref()) {
        picker_config = picker_config.with_token_path(path);
    }
    let stored = StoredCredentials::new(picker_config)?;

    if stored.is_authenticated() && !force {
        save_credentials_to_config(config_path, &credentials, origin);
        println!("Already signed in to Google Photos.");
        println!("Use --force to sign in again.");
        return Ok(());
    }

    println!("Starting Google Photos sign-in...");
    println!();
    println!("A browser window will open for you to authorize access.");
    println!("If the browser doesn't open, check the terminal for a URL to copy.");
    println!();

    stored.authenticate().await?;
    save_credentials_to_config(config_path, &credentials, origin);

    info!("Google sign-in successful");
    println!();
    println!("Signed in. Your tokens were saved to {}.", stored.storage().path().display());
    println!();
    println!("Run `photopick pick` to choose photos.");
    Ok(())
}

/// Resolves the OAuth client credentials.
///
/// Priority (highest to lowest):
/// 1. `--client-id` + `--client-secret`
/// 2. `--credentials-file` (Google Cloud Console JSON)
/// 3. the `[google]` section of `config.toml`
fn resolve_google_credentials(
    cli_client_id: Option<String>,
    cli_client_secret: Option<String>,
    cli_credentials_file: Option<PathBuf>,
    config_google: Option<&GoogleSettings>,
) -> ClientResult<(OAuthCredentials, CredentialOrigin)> {
    match (cli_client_id, cli_client_secret) {
        (Some(id), Some(secret)) => {
            return Ok((OAuthCredentials::new(id, secret), CredentialOrigin::Cli));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(ClientError::Config(
                "both --client-id and --client-secret are required when providing credentials directly"
                    .to_string(),
            ));
        }
        (None, None) => {}
    }

    if let Some(path) = cli_credentials_file {
        let credentials = OAuthCredentials::from_file(&path).map_err(|e| {
            ClientError::Config(format!(
                "failed to load credentials from {}: {}",
                path.display(),
                e
            ))
        })?;
        return Ok((credentials, CredentialOrigin::Cli));
    }

    if let Some(google) = config_google
        && google.client_id.is_some()
        && google.client_secret.is_some()
    {
        let credentials = google.resolve_credentials().map_err(|e| {
            ClientError::Config(format!(
                "failed to resolve Google credentials from config: {}",
                e
            ))
        })?;
        return Ok((credentials, CredentialOrigin::Config));
    }

    Err(ClientError::Config(format!(
        "Google credentials are required. Provide via:\n  \
         - client_id + client_secret in {}\n  \
         - --client-id and --client-secret flags\n  \
         - --credentials-file <path to Google Cloud Console JSON>",
        ClientConfig::default_path().display()
    )))
}

/// Writes CLI-supplied credentials under `[google]`, keeping the rest of the
/// file as it was. Failures are logged, not fatal.
fn save_credentials_to_config(
    config_path: &Path,
    credentials: &OAuthCredentials,
    origin: CredentialOrigin,
) {
    if origin == CredentialOrigin::Config {
        return;
    }

    match write_google_credentials(config_path, credentials) {
        Ok(()) => {
            info!(path = %config_path.display(), "credentials saved");
            println!("Credentials saved to {}", config_path.display());
        }
        Err(e) => warn!(path = %config_path.display(), error = %e, "could not save credentials"),
    }
}

fn write_google_credentials(
    config_path: &Path,
    credentials: &OAuthCredentials,
) -> Result<(), String> {
    let content = if config_path.exists() {
        std::fs::read_to_string(config_path).map_err(|e| e.to_string())?
    } else {
        String::new()
    };

    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| format!("could not parse config.toml for writing: {}", e))?;

    if !doc.contains_table("google") {
        doc["google"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let google = doc["google"]
        .as_table_mut()
        .ok_or("[google] in config.toml is not a table")?;
    google["client_id"] = toml_edit::value(credentials.client_id.as_str());
    google["client_secret"] = toml_edit::value(credentials.client_secret.as_str());

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("could not create {}: {}", parent.display(), e))?;
    }
    std::fs::write(config_path, doc.to_string()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_take_priority() {
        let config_google = GoogleSettings {
            client_id: Some("config-id.apps.googleusercontent.com".to_string()),
            client_secret: Some("config-secret".to_string()),
            ..Default::default()
        };
        let (creds, origin) = resolve_google_credentials(
            Some("cli-id.apps.googleusercontent.com".to_string()),
            Some("cli-secret".to_string()),
            None,
            Some(&config_google),
        )
        .unwrap();
        assert_eq!(creds.client_id, "cli-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "cli-secret");
        assert_eq!(origin, CredentialOrigin::Cli);
    }

    #[test]
    fn partial_cli_flags_fail() {
        assert!(
            resolve_google_credentials(
                Some("id.apps.googleusercontent.com".to_string()),
                None,
                None,
                None
            )
            .is_err()
        );
        assert!(resolve_google_credentials(None, Some("secret".to_string()), None, None).is_err());
    }

    #[test]
    fn nothing_configured_fails() {
        let err = resolve_google_credentials(None, None, None, None).unwrap_err();
        assert!(err.to_string().contains("credentials are required"));
    }

    #[test]
    fn credentials_file() {
        let tmp = tempfile::tempdir().unwrap();
        let creds_path = tmp.path().join("creds.json");
        std::fs::write(
            &creds_path,
            r#"{"installed": {"client_id": "file-id.apps.googleusercontent.com", "client_secret": "file-secret"}}"#,
        )
        .unwrap();

        let (creds, origin) =
            resolve_google_credentials(None, None, Some(creds_path), None).unwrap();
        assert_eq!(creds.client_id, "file-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "file-secret");
        assert_eq!(origin, CredentialOrigin::Cli);
    }

    #[test]
    fn config_section_is_last_resort() {
        let config_google = GoogleSettings {
            client_id: Some("config-id.apps.googleusercontent.com".to_string()),
            client_secret: Some("config-secret".to_string()),
            ..Default::default()
        };
        let (creds, origin) =
            resolve_google_credentials(None, None, None, Some(&config_google)).unwrap();
        assert_eq!(creds.client_id, "config-id.apps.googleusercontent.com");
        assert_eq!(origin, CredentialOrigin::Config);
    }

    #[test]
    fn save_skips_config_origin() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        save_credentials_to_config(
            &config_path,
            &OAuthCredentials::new("id", "secret"),
            CredentialOrigin::Config,
        );
        assert!(!config_path.exists());
    }

    #[test]
    fn save_preserves_other_sections() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            "# my settings\n[display]\nformat = \"json\"\n\n[google]\ntoken_path = \"/tmp/t.json\"\n",
        )
        .unwrap();

        save_credentials_to_config(
            &config_path,
            &OAuthCredentials::new("test.apps.googleusercontent.com", "test-secret"),
            CredentialOrigin::Cli,
        );

        let written = std::fs::read_to_string(&config_path).unwrap();
        assert!(written.starts_with("# my settings"));

        let reloaded = ClientConfig::load_from(&config_path).unwrap();
        let google = reloaded.google.unwrap();
        assert_eq!(
            google.client_id.as_deref(),
            Some("test.apps.googleusercontent.com")
        );
        assert_eq!(google.client_secret.as_deref(), Some("test-secret"));
        assert_eq!(google.token_path, Some(PathBuf::from("/tmp/t.json")));
        assert_eq!(reloaded.display.format, photopick_core::GalleryFormat::Json);
    }

    #[test]
    fn save_creates_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("nested").join("config.toml");
        save_credentials_to_config(
            &config_path,
            &OAuthCredentials::new("new.apps.googleusercontent.com", "new-secret"),
            CredentialOrigin::Cli,
        );

        let reloaded = ClientConfig::load_from(&config_path).unwrap();
        assert_eq!(
            reloaded.google.unwrap().client_id.as_deref(),
            Some("new.apps.googleusercontent.com")
        );
    }
}
