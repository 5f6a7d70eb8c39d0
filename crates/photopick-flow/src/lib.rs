//! Picker session polling and the picker flow state machine.
//!
//! - [`PollCoordinator`] polls one session until it completes, fails or
//!   times out, yielding exactly one [`PollOutcome`] per start.
//! - [`PickerFlow`] drives a whole interaction through
//!   idle → picking → polling → complete | error, opening the picker window
//!   through an [`ExternalOpener`] and publishing [`FlowSnapshot`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use photopick_flow::{BrowserOpener, PickerFlow};
//! use photopick_google::{OAuthCredentials, PickerConfig, PickerSessions, StoredCredentials};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PickerConfig::new(OAuthCredentials::new("id.apps.googleusercontent.com", "secret"));
//! let sessions = PickerSessions::new(&config, StoredCredentials::new(config.clone())?)?;
//! let mut flow = PickerFlow::new(Arc::new(sessions), BrowserOpener::default());
//! let navigation = flow.run().await?;
//! println!("picked in session {}", navigation.session_id);
//! # Ok(())
//! # }
//! ```

mod error;
mod flow;
mod opener;
mod poller;
mod state;

pub use error::{FlowError, FlowResult};
pub use flow::{FlowSettings, Navigation, PickerBackend, PickerFlow};
pub use opener::{BrowserOpener, BrowserWindow, ExternalOpener, ExternalWindow, picker_window_url};
pub use poller::{PollConfig, PollCoordinator, PollOutcome, PollRun, StatusSource};
pub use state::{FlowSnapshot, FlowState};
