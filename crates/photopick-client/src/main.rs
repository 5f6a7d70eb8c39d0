//! photopick CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use photopick_core::{TracingConfig, init_tracing};

use photopick_client::cli::{AuthProvider, Cli, Command, ConfigAction, SessionAction};
use photopick_client::commands::{self, pick::PickOptions};
use photopick_client::config::ClientConfig;
use photopick_client::error::{ClientError, ClientResult};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            if e.requires_reauth() {
                eprintln!("Run `photopick auth google` to sign in.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let config = if config_path.exists() {
        ClientConfig::load_from(&config_path).map_err(ClientError::Config)?
    } else {
        ClientConfig::default()
    };

    let tracing_config = if cli.debug || config.debug {
        let debug = TracingConfig::cli_debug();
        let directive = debug.default_directive();
        debug.with_env_filter(directive)
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match cli.command {
        Some(Command::Auth { provider }) => match provider {
            AuthProvider::Google {
                client_id,
                client_secret,
                credentials_file,
                force,
            } => {
                commands::auth::google(
                    client_id,
                    client_secret,
                    credentials_file,
                    force,
                    &config,
                    &config_path,
                )
                .await
            }
        },
        Some(Command::Logout) => commands::logout::logout(&config),
        Some(Command::Pick {
            json,
            no_browser,
            keep_session,
        }) => {
            let options = PickOptions {
                json,
                no_browser,
                keep_session,
            };
            commands::pick::pick(&config, options).await
        }
        Some(Command::Session { action }) => match action {
            SessionAction::Create { json } => commands::session::create(&config, json).await,
            SessionAction::Status { session_id, json } => {
                commands::session::status(&config, &session_id, json).await
            }
            SessionAction::Items { session_id, json } => {
                commands::session::items(&config, &session_id, json).await
            }
            SessionAction::Delete { session_id } => {
                commands::session::delete(&config, &session_id).await
            }
        },
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config, &config_path),
        },
        None => {
            println!("photopick - pick photos from Google Photos");
            println!();
            println!("Run 'photopick --help' for usage information.");
            println!();
            println!("Quick start:");
            println!(
                "  1. Sign in: photopick auth google --client-id <ID> --client-secret <SECRET>"
            );
            println!("  2. Pick photos: photopick pick");
            Ok(())
        }
    }
}
