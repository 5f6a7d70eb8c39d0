//! Opening the picker in an external window.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};
use url::Url;

use crate::error::{FlowError, FlowResult};

/// A window the flow opened and may later close.
pub trait ExternalWindow: Send + Sync {
    /// Returns false once the user (or the picker's auto-close) closed it.
    fn is_open(&self) -> bool;

    /// Closes the window if it is still open.
    fn close(&self);
}

/// Opens external windows for the flow.
pub trait ExternalOpener: Send + Sync {
    fn open(&self, url: &str) -> FlowResult<Arc<dyn ExternalWindow>>;
}

/// Returns the URL to open for a picker session.
///
/// Google closes the picker tab by itself once the user is done when the
/// `/autoclose` suffix is present.
pub fn picker_window_url(picker_uri: &str) -> FlowResult<String> {
    let mut url = Url::parse(picker_uri)
        .map_err(|e| FlowError::opener(format!("invalid picker URI {picker_uri:?}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| FlowError::opener(format!("picker URI {picker_uri:?} cannot take a path")))?
        .pop_if_empty()
        .push("autoclose");
    Ok(url.into())
}

/// Opens the picker in the user's default browser.
///
/// With `launch` disabled, or when no browser can be started, the URL is
/// printed to stderr for the user to open.
#[derive(Debug, Clone)]
pub struct BrowserOpener {
    launch: bool,
}

impl BrowserOpener {
    pub fn new(launch: bool) -> Self {
        Self { launch }
    }
}

impl Default for BrowserOpener {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ExternalOpener for BrowserOpener {
    fn open(&self, url: &str) -> FlowResult<Arc<dyn ExternalWindow>> {
        let launched = self.launch
            && match open::that_detached(url) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "failed to open browser");
                    false
                }
            };

        if launched {
            info!("opened picker in browser");
        } else {
            eprintln!("\nOpen this URL to pick your photos:\n\n{}\n", url);
        }
        Ok(Arc::new(BrowserWindow::default()))
    }
}

/// A browser tab. The tab itself cannot be observed from here, so it counts
/// as open until the flow closes it.
#[derive(Debug)]
pub struct BrowserWindow {
    open: AtomicBool,
}

impl Default for BrowserWindow {
    fn default() -> Self {
        Self {
            open: AtomicBool::new(true),
        }
    }
}

impl ExternalWindow for BrowserWindow {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}
