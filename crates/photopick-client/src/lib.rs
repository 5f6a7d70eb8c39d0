//! The `photopick` command-line interface.
//!
//! Signs in to Google, drives the picker flow and prints the selection.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
