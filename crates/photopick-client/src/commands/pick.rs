//! The interactive pick command.

use std::sync::Arc;

use photopick_core::render_gallery;
use photopick_flow::{BrowserOpener, FlowSnapshot, FlowState, PickerFlow};
use photopick_google::{CredentialSource, PickerSessions};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cli::gallery_format;
use crate::commands::stored_sessions;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Options from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct PickOptions {
    pub json: bool,
    pub no_browser: bool,
    pub keep_session: bool,
}

/// Opens the picker, waits for the selection and prints the gallery.
pub async fn pick(config: &ClientConfig, options: PickOptions) -> ClientResult<()> {
    config.picker.validate().map_err(ClientError::Config)?;
    let sessions = Arc::new(stored_sessions(config)?);
    let opener = BrowserOpener::new(config.picker.open_browser && !options.no_browser);
    let mut flow =
        PickerFlow::new(sessions.clone(), opener).with_settings(config.picker.flow_settings());

    let progress = tokio::spawn(report_progress(flow.subscribe()));
    let outcome = tokio::select! {
        result = flow.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    progress.abort();

    let session_id = flow.snapshot().session_id;
    flow.teardown();

    let navigation = match outcome {
        Some(Ok(navigation)) => navigation,
        Some(Err(e)) => {
            finish_session(&sessions, options, session_id.as_deref()).await;
            return Err(e.into());
        }
        None => {
            eprintln!();
            finish_session(&sessions, options, session_id.as_deref()).await;
            return Err(ClientError::Interrupted);
        }
    };

    let items = sessions.list_all_items(&navigation.session_id).await?;
    println!(
        "{}",
        render_gallery(&items, gallery_format(options.json, config.display.format))
    );

    finish_session(&sessions, options, Some(&navigation.session_id)).await;
    Ok(())
}

/// Returns the session to delete on the way out, or `None` when there is
/// none or the user asked to keep it.
fn session_to_discard(options: PickOptions, session_id: Option<&str>) -> Option<&str> {
    session_id.filter(|_| !options.keep_session)
}

/// Deletes the session unless it is being kept, however the command ended.
async fn finish_session<C: CredentialSource>(
    sessions: &PickerSessions<C>,
    options: PickOptions,
    session_id: Option<&str>,
) {
    match (session_to_discard(options, session_id), session_id) {
        (Some(id), _) => discard_session(sessions, id).await,
        (None, Some(id)) => eprintln!("Kept picker session {}", id),
        (None, None) => {}
    }
}

/// Best-effort session cleanup.
async fn discard_session<C: CredentialSource>(sessions: &PickerSessions<C>, session_id: &str) {
    if let Err(e) = sessions.delete_session(session_id).await {
        warn!(session_id, error = %e, "failed to delete picker session");
    }
}

async fn report_progress(mut updates: watch::Receiver<FlowSnapshot>) {
    let mut progress = Progress::default();
    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        if let Some(line) = progress.line(&snapshot) {
            eprintln!("{}", line);
        }
    }
    debug!("flow finished, progress reporter done");
}

/// Turns snapshot changes into progress lines for the terminal.
#[derive(Debug, Default)]
struct Progress {
    last: FlowSnapshot,
}

impl Progress {
    fn line(&mut self, snapshot: &FlowSnapshot) -> Option<&'static str> {
        let previous = std::mem::replace(&mut self.last, snapshot.clone());

        if snapshot.state != previous.state {
            return match snapshot.state {
                FlowState::Picking => Some("Opening the Google Photos picker..."),
                FlowState::Polling => {
                    Some("Waiting for you to finish picking (Ctrl-C to cancel)...")
                }
                FlowState::Complete => Some("Selection received."),
                FlowState::Idle | FlowState::Error => None,
            };
        }

        if snapshot.window_closed && !previous.window_closed && snapshot.state.is_active() {
            return Some("Picker window closed, still waiting for Google to confirm...");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(state: FlowState, window_closed: bool) -> FlowSnapshot {
        FlowSnapshot {
            state,
            session_id: Some("sess-1".to_string()),
            window_closed,
            ..Default::default()
        }
    }

    #[test]
    fn kept_session_is_never_discarded() {
        let keep = PickOptions {
            keep_session: true,
            ..Default::default()
        };
        assert_eq!(session_to_discard(keep, Some("sess-1")), None);
        assert_eq!(session_to_discard(keep, None), None);
    }

    #[test]
    fn session_is_discarded_by_default() {
        let options = PickOptions::default();
        assert_eq!(session_to_discard(options, Some("sess-1")), Some("sess-1"));
        // Nothing was created before the flow stopped.
        assert_eq!(session_to_discard(options, None), None);
    }

    #[test]
    fn progress_follows_state_changes() {
        let mut progress = Progress::default();
        assert!(
            progress
                .line(&snapshot(FlowState::Picking, false))
                .unwrap()
                .contains("Opening")
        );
        assert!(
            progress
                .line(&snapshot(FlowState::Polling, false))
                .unwrap()
                .contains("Ctrl-C")
        );
        // Same state again prints nothing.
        assert_eq!(progress.line(&snapshot(FlowState::Polling, false)), None);
        assert_eq!(
            progress.line(&snapshot(FlowState::Complete, false)),
            Some("Selection received.")
        );
    }

    #[test]
    fn progress_reports_window_close_once() {
        let mut progress = Progress::default();
        progress.line(&snapshot(FlowState::Polling, false));
        assert!(
            progress
                .line(&snapshot(FlowState::Polling, true))
                .unwrap()
                .contains("window closed")
        );
        assert_eq!(progress.line(&snapshot(FlowState::Polling, true)), None);
    }

    #[test]
    fn progress_is_silent_on_error() {
        let mut progress = Progress::default();
        progress.line(&snapshot(FlowState::Polling, false));
        let failed = FlowSnapshot {
            state: FlowState::Error,
            error_message: Some("boom".to_string()),
            ..Default::default()
        };
        assert_eq!(progress.line(&failed), None);
    }
}
