//! Session poll coordinator.
//!
//! Polls a picker session at a fixed cadence until the user finishes, a poll
//! fails, or the deadline passes. Each [`PollCoordinator::start`] produces a
//! [`PollRun`] that resolves to exactly one [`PollOutcome`], or to `None` if
//! the run was stopped first.
//!
//! Polls are not serialized: a tick fires on schedule even while an earlier
//! request is still in flight, and whichever response first decides the run
//! wins.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use photopick_google::{
    BoxFuture, CreatedSession, CredentialSource, PickerError, PickerResult, PickerSessions,
    SessionStatus,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, info, warn};

/// Lower bound on the poll period; a zero interval would spin.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Something that can report whether a session's selection is complete.
pub trait StatusSource: Send + Sync + 'static {
    fn poll_status<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, PickerResult<SessionStatus>>;
}

impl<C: CredentialSource + 'static> StatusSource for PickerSessions<C> {
    fn poll_status<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, PickerResult<SessionStatus>> {
        Box::pin(self.poll_session(session_id))
    }
}

/// Cadence and deadline for one poll run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Absolute limit measured from `start`, not renewed per poll.
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Takes the interval and timeout the session advertised, falling back to
    /// `default_timeout` when it advertised none.
    pub fn from_session(session: &CreatedSession, default_timeout: Duration) -> Self {
        Self {
            interval: Duration::from_millis(session.poll_interval_ms),
            timeout: session
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(default_timeout),
        }
    }
}

/// How a poll run ended.
#[derive(Debug)]
pub enum PollOutcome {
    /// The user finished picking.
    Complete { session_id: String },
    /// A poll request failed. Not retried.
    Failed(PickerError),
    /// The deadline passed first.
    TimedOut,
}

impl PollOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// The pending result of one [`PollCoordinator::start`] call.
///
/// Resolves to `None` if the run was stopped, even when a response had
/// already arrived.
#[derive(Debug)]
pub struct PollRun {
    outcome: oneshot::Receiver<PollOutcome>,
    cancelled: Arc<AtomicBool>,
}

impl Future for PollRun {
    type Output = Option<PollOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Poll::Ready(None);
        }
        match Pin::new(&mut self.outcome).poll(cx) {
            Poll::Ready(Ok(outcome)) if !self.cancelled.load(Ordering::SeqCst) => {
                Poll::Ready(Some(outcome))
            }
            Poll::Ready(_) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct ActiveRun {
    session_id: String,
    task: JoinHandle<()>,
    polling: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

/// Drives poll runs against a [`StatusSource`]. At most one run is active.
pub struct PollCoordinator<S> {
    source: Arc<S>,
    active: Option<ActiveRun>,
}

impl<S: StatusSource> PollCoordinator<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            active: None,
        }
    }

    /// Starts polling `session_id`, stopping any previous run first.
    ///
    /// The first poll is issued immediately. Must be called within a tokio
    /// runtime.
    pub fn start(&mut self, session_id: impl Into<String>, config: PollConfig) -> PollRun {
        self.stop();

        let session_id = session_id.into();
        let polling = Arc::new(AtomicBool::new(true));
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();

        info!(
            session_id = %session_id,
            interval_ms = config.interval.as_millis() as u64,
            timeout_ms = config.timeout.as_millis() as u64,
            "starting poll run"
        );

        let task = tokio::spawn(drive(
            self.source.clone(),
            session_id.clone(),
            config,
            polling.clone(),
            tx,
        ));

        self.active = Some(ActiveRun {
            session_id,
            task,
            polling,
            cancelled: cancelled.clone(),
        });

        PollRun {
            outcome: rx,
            cancelled,
        }
    }

    /// Stops the current run, if any. Its [`PollRun`] resolves to `None`.
    pub fn stop(&mut self) {
        if let Some(run) = self.active.take() {
            run.cancelled.store(true, Ordering::SeqCst);
            run.polling.store(false, Ordering::SeqCst);
            run.task.abort();
            debug!(session_id = %run.session_id, "poll run stopped");
        }
    }

    /// Returns true while a run is waiting for its outcome.
    pub fn is_polling(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|run| run.polling.load(Ordering::SeqCst))
    }
}

impl<S> Drop for PollCoordinator<S> {
    fn drop(&mut self) {
        if let Some(run) = self.active.take() {
            run.cancelled.store(true, Ordering::SeqCst);
            run.task.abort();
        }
    }
}

async fn drive<S: StatusSource>(
    source: Arc<S>,
    session_id: String,
    config: PollConfig,
    polling: Arc<AtomicBool>,
    tx: oneshot::Sender<PollOutcome>,
) {
    let started = Instant::now();
    let deadline = sleep_until(started + config.timeout);
    tokio::pin!(deadline);

    let mut ticker = interval_at(started, config.interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut in_flight = FuturesUnordered::new();
    let mut attempts: u32 = 0;

    let outcome = loop {
        tokio::select! {
            biased;

            _ = &mut deadline => {
                warn!(session_id = %session_id, attempts, "picker session timed out");
                break PollOutcome::TimedOut;
            }

            Some(result) = in_flight.next(), if !in_flight.is_empty() => match result {
                Ok(SessionStatus { media_items_set: true, .. }) => {
                    info!(session_id = %session_id, attempts, "selection complete");
                    break PollOutcome::Complete { session_id: session_id.clone() };
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "poll failed");
                    break PollOutcome::Failed(e);
                }
            },

            _ = ticker.tick() => {
                attempts += 1;
                debug!(session_id = %session_id, attempt = attempts, in_flight = in_flight.len(), "polling session");
                in_flight.push(source.poll_status(&session_id));
            }
        }
    };

    polling.store(false, Ordering::SeqCst);
    let _ = tx.send(outcome);
}
