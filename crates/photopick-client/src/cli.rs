//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use photopick_core::GalleryFormat;

/// photopick - pick photos from Google Photos
#[derive(Debug, Parser)]
#[command(name = "photopick")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "PHOTOPICK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authentication commands
    Auth {
        #[command(subcommand)]
        provider: AuthProvider,
    },

    /// Forget the stored Google sign-in
    Logout,

    /// Open the picker, wait for the selection and print it
    Pick {
        /// Print the selection as JSON
        #[arg(long)]
        json: bool,

        /// Print the picker URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,

        /// Keep the picker session after listing its items
        #[arg(long)]
        keep_session: bool,
    },

    /// Low-level picker session commands
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Authentication providers.
#[derive(Debug, Subcommand)]
pub enum AuthProvider {
    /// Sign in to Google Photos
    Google {
        /// OAuth client ID (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        client_id: Option<String>,

        /// OAuth client secret (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
        client_secret: Option<String>,

        /// Path to Google Cloud Console credentials JSON file
        ///
        /// This is the JSON file downloaded from the Google Cloud Console
        /// OAuth 2.0 credentials page. Alternative to providing client_id
        /// and client_secret separately.
        #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
        credentials_file: Option<PathBuf>,

        /// Force re-authentication even if already authenticated
        #[arg(long, short)]
        force: bool,
    },
}

/// Picker session actions.
#[derive(Debug, Subcommand)]
pub enum SessionAction {
    /// Create a session and print its picker URL
    Create {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show whether the user finished picking
    Status {
        session_id: String,

        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the items picked in a session
    Items {
        session_id: String,

        /// Print the selection as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a session
    Delete { session_id: String },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

/// Picks the gallery format: `--json` wins over the configured default.
pub fn gallery_format(json: bool, configured: GalleryFormat) -> GalleryFormat {
    if json { GalleryFormat::Json } else { configured }
}
