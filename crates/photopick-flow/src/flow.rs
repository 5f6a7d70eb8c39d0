//! The picker flow state machine.
//!
//! Sequences one picker interaction: create a session, open the picker
//! window, poll until the user is done, then hand over to the gallery.
//!
//! Side effects belong to transitions. Entering `picking` opens the window
//! and starts the window monitor; entering `polling` starts the coordinator;
//! entering `complete` waits the navigation delay; entering `error` stops the
//! window monitor. [`PickerFlow::teardown`] (also run on drop) stops
//! everything regardless of state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use photopick_google::error::MESSAGE_TIMEOUT;
use photopick_google::{
    BoxFuture, CreatedSession, CredentialSource, PickerError, PickerResult, PickerSessions,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::error::{FlowError, FlowResult};
use crate::opener::{ExternalOpener, ExternalWindow, picker_window_url};
use crate::poller::{PollConfig, PollCoordinator, PollOutcome, PollRun, StatusSource};
use crate::state::{FlowSnapshot, FlowState};

/// The picker operations the flow needs.
pub trait PickerBackend: StatusSource {
    fn create_session(&self) -> BoxFuture<'_, PickerResult<CreatedSession>>;
}

impl<C: CredentialSource + 'static> PickerBackend for PickerSessions<C> {
    fn create_session(&self) -> BoxFuture<'_, PickerResult<CreatedSession>> {
        Box::pin(PickerSessions::create_session(self))
    }
}

/// Timing knobs for a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSettings {
    /// Poll deadline when the session does not advertise one.
    pub default_timeout: Duration,
    /// Pause between completion and handing over to the gallery.
    pub navigation_delay: Duration,
    /// How often the window monitor checks whether the picker was closed.
    pub window_check_interval: Duration,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30 * 60),
            navigation_delay: Duration::from_millis(1000),
            window_check_interval: Duration::from_secs(1),
        }
    }
}

/// Hand-off to the gallery once the user finished picking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub session_id: String,
}

/// One picker interaction.
pub struct PickerFlow<B: PickerBackend, O: ExternalOpener> {
    backend: Arc<B>,
    opener: O,
    settings: FlowSettings,
    coordinator: PollCoordinator<B>,
    run: Option<PollRun>,
    window: Option<Arc<dyn ExternalWindow>>,
    monitor: Option<JoinHandle<()>>,
    snapshot: Arc<watch::Sender<FlowSnapshot>>,
    window_closed: Arc<AtomicBool>,
}

impl<B: PickerBackend, O: ExternalOpener> PickerFlow<B, O> {
    pub fn new(backend: Arc<B>, opener: O) -> Self {
        let (snapshot, _) = watch::channel(FlowSnapshot::default());
        Self {
            coordinator: PollCoordinator::new(backend.clone()),
            backend,
            opener,
            settings: FlowSettings::default(),
            run: None,
            window: None,
            monitor: None,
            snapshot: Arc::new(snapshot),
            window_closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Builder: set the timing knobs.
    pub fn with_settings(mut self, settings: FlowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn state(&self) -> FlowState {
        self.snapshot.borrow().state
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receives every state change.
    pub fn subscribe(&self) -> watch::Receiver<FlowSnapshot> {
        self.snapshot.subscribe()
    }

    /// Returns true once the monitor has seen the picker window closed.
    pub fn window_closed(&self) -> bool {
        self.window_closed.load(Ordering::SeqCst)
    }

    pub fn is_polling(&self) -> bool {
        self.coordinator.is_polling()
    }

    fn transition(
        &self,
        next: FlowState,
        update: impl FnOnce(&mut FlowSnapshot),
    ) -> FlowResult<()> {
        let from = self.state();
        if !from.can_transition_to(next) {
            return Err(FlowError::InvalidTransition { from, to: next });
        }
        self.snapshot.send_modify(|snapshot| {
            snapshot.state = next;
            update(snapshot);
        });
        debug!(%from, to = %next, "flow transition");
        Ok(())
    }

    /// Moves to `error` with a user-facing message and stops the window monitor.
    fn fail(&mut self, error: FlowError) -> FlowError {
        let message = error.user_message();
        warn!(error = %error, "picker flow failed");
        self.stop_monitor();
        if let Err(e) = self.transition(FlowState::Error, |s| s.error_message = Some(message)) {
            warn!(error = %e, "could not enter error state");
        }
        error
    }

    /// Creates a session, opens the picker window and starts polling.
    ///
    /// Leaves the flow in `polling` on success and in `error` on failure.
    pub async fn begin(&mut self) -> FlowResult<CreatedSession> {
        let from = self.state();
        if !from.can_transition_to(FlowState::Picking) {
            return Err(FlowError::InvalidTransition {
                from,
                to: FlowState::Picking,
            });
        }

        let created = match self.backend.create_session().await {
            Ok(created) => created,
            Err(e) => return Err(self.fail(e.into())),
        };

        let session_id = created.session_id.clone();
        self.transition(FlowState::Picking, |s| {
            s.session_id = Some(session_id);
            s.error_message = None;
            s.window_closed = false;
        })?;

        let window = picker_window_url(&created.picker_uri)
            .and_then(|url| self.opener.open(&url));
        let window = match window {
            Ok(window) => window,
            Err(e) => return Err(self.fail(e)),
        };
        self.start_monitor(window.clone());
        self.window = Some(window);

        let config = PollConfig::from_session(&created, self.settings.default_timeout);
        self.run = Some(self.coordinator.start(created.session_id.clone(), config));
        self.transition(FlowState::Polling, |_| {})?;

        info!(session_id = %created.session_id, "waiting for the user to pick");
        Ok(created)
    }

    /// Waits for the poll run begun by [`begin`](Self::begin) to finish.
    ///
    /// On completion, waits the navigation delay and returns where to go next.
    pub async fn finish(&mut self) -> FlowResult<Navigation> {
        let from = self.state();
        let run = match (from, self.run.take()) {
            (FlowState::Polling, Some(run)) => run,
            _ => {
                return Err(FlowError::InvalidTransition {
                    from,
                    to: FlowState::Complete,
                });
            }
        };

        match run.await {
            Some(PollOutcome::Complete { session_id }) => {
                self.stop_monitor();
                self.transition(FlowState::Complete, |_| {})?;
                tokio::time::sleep(self.settings.navigation_delay).await;
                info!(session_id = %session_id, "selection complete, showing gallery");
                Ok(Navigation { session_id })
            }
            Some(PollOutcome::Failed(e)) => Err(self.fail(e.into())),
            Some(PollOutcome::TimedOut) => {
                Err(self.fail(PickerError::timeout(MESSAGE_TIMEOUT).into()))
            }
            None => Err(self.fail(FlowError::Stopped)),
        }
    }

    /// Runs a whole interaction: [`begin`](Self::begin) then [`finish`](Self::finish).
    pub async fn run(&mut self) -> FlowResult<Navigation> {
        self.begin().await?;
        self.finish().await
    }

    /// Goes back to `idle` from `error`, forgetting the session and message.
    pub fn retry(&mut self) -> FlowResult<()> {
        self.transition(FlowState::Idle, |s| *s = FlowSnapshot::default())?;
        self.teardown();
        self.window_closed.store(false, Ordering::SeqCst);
        info!("picker flow reset");
        Ok(())
    }

    /// Stops polling, stops the window monitor and closes the window.
    ///
    /// Safe to call in any state and more than once.
    pub fn teardown(&mut self) {
        self.coordinator.stop();
        self.run = None;
        self.stop_monitor();
        if let Some(window) = self.window.take()
            && window.is_open()
        {
            debug!("closing picker window");
            window.close();
        }
    }

    fn start_monitor(&mut self, window: Arc<dyn ExternalWindow>) {
        self.stop_monitor();
        self.window_closed.store(false, Ordering::SeqCst);

        let period = self.settings.window_check_interval.max(Duration::from_millis(1));
        let closed = self.window_closed.clone();
        let snapshot = self.snapshot.clone();

        self.monitor = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !window.is_open() {
                    info!("picker window was closed, still waiting for the selection");
                    closed.store(true, Ordering::SeqCst);
                    snapshot.send_modify(|s| s.window_closed = true);
                    break;
                }
            }
        }));
    }

    fn stop_monitor(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }
}

impl<B: PickerBackend, O: ExternalOpener> Drop for PickerFlow<B, O> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::tests::{Reply, ScriptedSource};
    use photopick_google::{PickerErrorCode, SessionStatus};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// A backend that creates sessions from a fixed answer and polls from a
    /// script.
    struct FakeBackend {
        create: Mutex<Option<PickerResult<CreatedSession>>>,
        creates: AtomicUsize,
        polls: Arc<ScriptedSource>,
    }

    impl FakeBackend {
        fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
            Self::with_create(Ok(session(5_000, Some(1_800_000))), replies)
        }

        fn with_create(
            create: PickerResult<CreatedSession>,
            replies: impl IntoIterator<Item = Reply>,
        ) -> Arc<Self> {
            Arc::new(Self {
                create: Mutex::new(Some(create)),
                creates: AtomicUsize::new(0),
                polls: ScriptedSource::new(replies),
            })
        }
    }

    impl StatusSource for FakeBackend {
        fn poll_status<'a>(
            &'a self,
            session_id: &'a str,
        ) -> BoxFuture<'a, PickerResult<SessionStatus>> {
            self.polls.poll_status(session_id)
        }
    }

    impl PickerBackend for FakeBackend {
        fn create_session(&self) -> BoxFuture<'_, PickerResult<CreatedSession>> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            let answer = self
                .create
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(session(5_000, Some(1_800_000))));
            Box::pin(async move { answer })
        }
    }

    fn session(poll_interval_ms: u64, timeout_ms: Option<u64>) -> CreatedSession {
        CreatedSession {
            session_id: "s1".into(),
            picker_uri: "https://photos.google.com/picker/s1".into(),
            poll_interval_ms,
            timeout_ms,
            expire_time: None,
        }
    }

    /// Records opened URLs and hands out windows the test can close.
    #[derive(Clone, Default)]
    struct FakeOpener {
        opened: Arc<Mutex<Vec<String>>>,
        windows: Arc<Mutex<Vec<Arc<FakeWindow>>>>,
        fail: bool,
    }

    #[derive(Default)]
    struct FakeWindow {
        closed_by_user: AtomicBool,
        closed_by_flow: AtomicBool,
    }

    impl ExternalWindow for FakeWindow {
        fn is_open(&self) -> bool {
            !self.closed_by_user.load(Ordering::SeqCst) && !self.closed_by_flow.load(Ordering::SeqCst)
        }

        fn close(&self) {
            self.closed_by_flow.store(true, Ordering::SeqCst);
        }
    }

    impl FakeOpener {
        fn window(&self) -> Arc<FakeWindow> {
            self.windows.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl ExternalOpener for FakeOpener {
        fn open(&self, url: &str) -> FlowResult<Arc<dyn ExternalWindow>> {
            if self.fail {
                return Err(FlowError::opener("no display"));
            }
            self.opened.lock().unwrap().push(url.to_string());
            let window = Arc::new(FakeWindow::default());
            self.windows.lock().unwrap().push(window.clone());
            Ok(window)
        }
    }

    fn flow(backend: Arc<FakeBackend>, opener: FakeOpener) -> PickerFlow<FakeBackend, FakeOpener> {
        PickerFlow::new(backend, opener).with_settings(FlowSettings {
            default_timeout: Duration::from_secs(60),
            navigation_delay: Duration::from_millis(1500),
            window_check_interval: Duration::from_millis(500),
        })
    }

    mod begin {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn enters_polling_with_session_cadence() {
            let backend = FakeBackend::new([]);
            let opener = FakeOpener::default();
            let mut flow = flow(backend.clone(), opener.clone());
            let mut states = flow.subscribe();

            let created = flow.begin().await.unwrap();

            assert_eq!(created.poll_interval_ms, 5_000);
            assert_eq!(created.timeout_ms, Some(1_800_000));
            assert_eq!(flow.state(), FlowState::Polling);
            assert_eq!(flow.snapshot().session_id.as_deref(), Some("s1"));
            assert!(flow.is_polling());
            assert!(states.has_changed().unwrap());
            assert_eq!(states.borrow_and_update().state, FlowState::Polling);
            assert_eq!(
                *opener.opened.lock().unwrap(),
                ["https://photos.google.com/picker/s1/autoclose"]
            );

            // The first poll fires immediately, the next one after 5s.
            tokio::task::yield_now().await;
            assert_eq!(backend.polls.calls(), 1);
            tokio::time::sleep(Duration::from_millis(5_001)).await;
            assert_eq!(backend.polls.calls(), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn passes_through_picking() {
            let backend = FakeBackend::new([]);
            let mut flow = flow(backend, FakeOpener::default());
            let mut states = flow.subscribe();

            let watcher = tokio::spawn(async move {
                let mut seen = Vec::new();
                while states.changed().await.is_ok() {
                    let state = states.borrow_and_update().state;
                    seen.push(state);
                    if state == FlowState::Polling {
                        break;
                    }
                }
                seen
            });

            // Give the watcher a chance to park on `changed`.
            tokio::task::yield_now().await;
            flow.begin().await.unwrap();
            let seen = watcher.await.unwrap();
            assert_eq!(seen.last(), Some(&FlowState::Polling));
            assert!(seen.len() <= 2);
            if seen.len() == 2 {
                assert_eq!(seen[0], FlowState::Picking);
            }
        }

        #[tokio::test]
        async fn create_failure_enters_error() {
            let backend = FakeBackend::with_create(
                Err(PickerError::from_http_status(403, None, "nope")),
                [],
            );
            let opener = FakeOpener::default();
            let mut flow = flow(backend, opener.clone());

            let err = flow.begin().await.unwrap_err();

            assert!(matches!(err, FlowError::Picker(ref e) if e.code() == PickerErrorCode::Forbidden));
            let snapshot = flow.snapshot();
            assert_eq!(snapshot.state, FlowState::Error);
            assert_eq!(
                snapshot.error_message.as_deref(),
                Some(photopick_google::error::MESSAGE_FORBIDDEN)
            );
            assert!(opener.opened.lock().unwrap().is_empty());
            assert!(!flow.is_polling());
        }

        #[tokio::test]
        async fn opener_failure_enters_error_without_polling() {
            let backend = FakeBackend::new([]);
            let opener = FakeOpener {
                fail: true,
                ..Default::default()
            };
            let mut flow = flow(backend.clone(), opener);

            let err = flow.begin().await.unwrap_err();

            assert!(matches!(err, FlowError::Opener { .. }));
            assert_eq!(flow.state(), FlowState::Error);
            assert!(!flow.is_polling());
            assert_eq!(backend.polls.calls(), 0);
        }

        #[tokio::test]
        async fn begin_twice_is_rejected() {
            let mut flow = flow(FakeBackend::new([]), FakeOpener::default());
            flow.begin().await.unwrap();

            let err = flow.begin().await.unwrap_err();
            assert!(matches!(
                err,
                FlowError::InvalidTransition {
                    from: FlowState::Polling,
                    to: FlowState::Picking
                }
            ));
            assert_eq!(flow.state(), FlowState::Polling);
        }
    }

    mod finish {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn complete_on_third_poll_navigates_after_delay() {
            let backend = FakeBackend::new([Reply::Pending, Reply::Pending, Reply::Done]);
            let opener = FakeOpener::default();
            let mut flow = flow(backend.clone(), opener.clone());
            let started = tokio::time::Instant::now();

            let navigation = flow.run().await.unwrap();

            assert_eq!(navigation, Navigation { session_id: "s1".into() });
            assert_eq!(flow.state(), FlowState::Complete);
            assert_eq!(backend.polls.calls(), 3);
            assert!(!flow.is_polling());
            // Two 5s intervals, then the 1.5s navigation delay.
            assert_eq!(started.elapsed(), Duration::from_millis(11_500));

            tokio::time::sleep(Duration::from_secs(30)).await;
            assert_eq!(backend.polls.calls(), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn timeout_enters_error_with_distinct_message() {
            let backend = FakeBackend::with_create(Ok(session(5_000, Some(30_000))), []);
            let mut flow = flow(backend, FakeOpener::default());
            let started = tokio::time::Instant::now();

            let err = flow.run().await.unwrap_err();

            assert!(started.elapsed() >= Duration::from_millis(30_000));
            assert!(matches!(err, FlowError::Picker(ref e) if e.code() == PickerErrorCode::Timeout));
            let snapshot = flow.snapshot();
            assert_eq!(snapshot.state, FlowState::Error);
            assert_eq!(snapshot.error_message.as_deref(), Some(MESSAGE_TIMEOUT));
        }

        #[tokio::test(start_paused = true)]
        async fn session_without_timeout_uses_default() {
            let backend = FakeBackend::with_create(Ok(session(5_000, None)), []);
            let mut flow = flow(backend, FakeOpener::default());
            let started = tokio::time::Instant::now();

            flow.run().await.unwrap_err();
            assert_eq!(started.elapsed(), Duration::from_secs(60));
        }

        #[tokio::test(start_paused = true)]
        async fn not_found_enters_error() {
            let backend = FakeBackend::new([Reply::Pending, Reply::Fail(404)]);
            let mut flow = flow(backend, FakeOpener::default());

            let err = flow.run().await.unwrap_err();

            assert!(matches!(err, FlowError::Picker(ref e) if e.code() == PickerErrorCode::SessionNotFound));
            assert_eq!(
                flow.snapshot().error_message.as_deref(),
                Some(photopick_google::error::MESSAGE_SESSION_NOT_FOUND)
            );
        }

        #[tokio::test]
        async fn finish_without_begin_is_rejected() {
            let mut flow = flow(FakeBackend::new([]), FakeOpener::default());
            let err = flow.finish().await.unwrap_err();
            assert!(matches!(
                err,
                FlowError::InvalidTransition {
                    from: FlowState::Idle,
                    to: FlowState::Complete
                }
            ));
            assert_eq!(flow.state(), FlowState::Idle);
        }
    }

    mod retry {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn resets_to_idle_without_session_or_message() {
            let backend = FakeBackend::new([Reply::Fail(500)]);
            let mut flow = flow(backend.clone(), FakeOpener::default());
            flow.run().await.unwrap_err();
            assert_eq!(flow.state(), FlowState::Error);

            flow.retry().unwrap();

            assert_eq!(flow.snapshot(), FlowSnapshot::default());
            assert!(!flow.window_closed());

            // A fresh interaction works after retry.
            let navigation = {
                flow.begin().await.unwrap();
                backend.polls.push(Reply::Done);
                flow.finish().await.unwrap()
            };
            assert_eq!(navigation.session_id, "s1");
            assert_eq!(backend.creates.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn retry_only_from_error() {
            let mut flow = flow(FakeBackend::new([]), FakeOpener::default());
            assert!(matches!(
                flow.retry(),
                Err(FlowError::InvalidTransition {
                    from: FlowState::Idle,
                    to: FlowState::Idle
                })
            ));
        }
    }

    mod window {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn closing_window_is_observed_but_does_not_cancel_polling() {
            let backend = FakeBackend::new([]);
            let opener = FakeOpener::default();
            let mut flow = flow(backend.clone(), opener.clone());
            flow.begin().await.unwrap();

            opener.window().closed_by_user.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(600)).await;

            assert!(flow.window_closed());
            assert!(flow.snapshot().window_closed);
            assert_eq!(flow.state(), FlowState::Polling);
            assert!(flow.is_polling());

            tokio::time::sleep(Duration::from_secs(10)).await;
            assert!(backend.polls.calls() >= 3);
        }

        #[tokio::test(start_paused = true)]
        async fn teardown_stops_everything_and_closes_window() {
            let backend = FakeBackend::new([]);
            let opener = FakeOpener::default();
            let mut flow = flow(backend.clone(), opener.clone());
            flow.begin().await.unwrap();
            tokio::task::yield_now().await;

            flow.teardown();

            let window = opener.window();
            assert!(window.closed_by_flow.load(Ordering::SeqCst));
            assert!(!flow.is_polling());

            let calls = backend.polls.calls();
            tokio::time::sleep(Duration::from_secs(30)).await;
            assert_eq!(backend.polls.calls(), calls);

            // Idempotent.
            flow.teardown();
        }

        #[tokio::test(start_paused = true)]
        async fn drop_runs_teardown() {
            let backend = FakeBackend::new([]);
            let opener = FakeOpener::default();
            let mut flow = flow(backend.clone(), opener.clone());
            flow.begin().await.unwrap();
            tokio::task::yield_now().await;

            drop(flow);

            assert!(opener.window().closed_by_flow.load(Ordering::SeqCst));
            let calls = backend.polls.calls();
            tokio::time::sleep(Duration::from_secs(30)).await;
            assert_eq!(backend.polls.calls(), calls);
        }

        #[tokio::test(start_paused = true)]
        async fn error_stops_window_monitor() {
            let backend = FakeBackend::new([Reply::Fail(500)]);
            let opener = FakeOpener::default();
            let mut flow = flow(backend, opener.clone());
            flow.run().await.unwrap_err();

            opener.window().closed_by_user.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            assert!(!flow.window_closed());
        }
    }
}
