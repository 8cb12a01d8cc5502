//! Analysis session: one crawl-and-filter run at a time, reported as events.
//!
//! The host starts a run with [`Analyzer::start_analysis`] and reads
//! [`AnalysisEvent`]s from the channel returned by [`Analyzer::new`].
//! A start request while a run is in flight is dropped. Cancelling a run
//! returns the session to idle and guarantees that run emits neither a
//! completion nor an error event.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use docgate_scoring::{ScoringAdapter, create_adapter};
use docgate_shared::{
    DocGateError, ErrorKind, FilterOutcome, Result, ScoredPage, Settings, urls,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::crawl::crawl_site;
use crate::filter::FilterPipeline;
use crate::progress::{BatchProgress, ProgressReporter};

/// Error reported when discovery turns up nothing.
pub const NO_URLS_FOUND: &str = "No URLs found. Check the base URL.";

// ---------------------------------------------------------------------------
// Events and state
// ---------------------------------------------------------------------------

/// Lifecycle of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisState {
    Idle,
    Crawling,
    Filtering,
    Done,
    Error,
}

/// Phase reported in progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Crawling,
    Filtering,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub phase: Phase,
    pub message: String,
    pub urls_found: usize,
    /// 0 to 100.
    pub percent: u8,
}

/// Everything the host hears about a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum AnalysisEvent {
    Progress(ProgressUpdate),
    RealtimeResult {
        page: ScoredPage,
        batch_progress: BatchProgress,
    },
    Complete(FilterOutcome),
    Error {
        kind: ErrorKind,
        message: String,
    },
}

/// Result of a start request.
#[derive(Debug)]
pub enum StartOutcome {
    Started {
        run_id: Uuid,
        handle: JoinHandle<()>,
    },
    /// Another run is in flight; the request was dropped.
    AlreadyRunning,
}

#[derive(Debug, Clone)]
struct ActiveRun {
    id: Uuid,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct SessionState {
    state: AnalysisState,
    active: Option<ActiveRun>,
}

type SharedState = Arc<Mutex<SessionState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Owns the session state and spawns analysis runs.
pub struct Analyzer {
    settings: Settings,
    /// Fixed adapter; when unset one is built from `settings.provider` per run.
    adapter: Option<Arc<dyn ScoringAdapter>>,
    events: mpsc::UnboundedSender<AnalysisEvent>,
    state: SharedState,
}

impl Analyzer {
    pub fn new(settings: Settings) -> (Self, mpsc::UnboundedReceiver<AnalysisEvent>) {
        Self::build(settings, None)
    }

    /// Use `adapter` for every run instead of building one from settings.
    pub fn with_adapter(
        settings: Settings,
        adapter: Arc<dyn ScoringAdapter>,
    ) -> (Self, mpsc::UnboundedReceiver<AnalysisEvent>) {
        Self::build(settings, Some(adapter))
    }

    fn build(
        settings: Settings,
        adapter: Option<Arc<dyn ScoringAdapter>>,
    ) -> (Self, mpsc::UnboundedReceiver<AnalysisEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let analyzer = Self {
            settings,
            adapter,
            events,
            state: Arc::new(Mutex::new(SessionState {
                state: AnalysisState::Idle,
                active: None,
            })),
        };
        (analyzer, rx)
    }

    pub fn state(&self) -> AnalysisState {
        lock(&self.state).state
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).active.is_some()
    }

    /// Validate input and spawn a run on the current tokio runtime.
    ///
    /// Invalid input is rejected here, before any network activity.
    pub fn start_analysis(&self, url: &str, issue_description: &str) -> Result<StartOutcome> {
        let url = validate_url(url)?;
        let issue = issue_description.trim();
        if issue.is_empty() {
            return Err(DocGateError::validation("issue description is required"));
        }

        let run = {
            let mut session = lock(&self.state);
            if session.active.is_some() {
                debug!("analysis already running, start request dropped");
                return Ok(StartOutcome::AlreadyRunning);
            }
            let run = ActiveRun {
                id: Uuid::now_v7(),
                cancel: CancellationToken::new(),
            };
            session.active = Some(run.clone());
            session.state = AnalysisState::Crawling;
            run
        };

        info!(run_id = %run.id, %url, "analysis started");

        let run_id = run.id;
        let task = AnalysisRun {
            run,
            settings: self.settings.clone(),
            adapter: self.adapter.clone(),
            events: self.events.clone(),
            state: Arc::clone(&self.state),
        };
        let handle = tokio::spawn(task.run(url, issue.to_string()));

        Ok(StartOutcome::Started { run_id, handle })
    }

    /// Cancel the in-flight run, if any. Returns whether one was running.
    pub fn cancel_analysis(&self) -> bool {
        let mut session = lock(&self.state);
        match session.active.take() {
            Some(run) => {
                run.cancel.cancel();
                session.state = AnalysisState::Idle;
                info!(run_id = %run.id, "analysis cancelled");
                true
            }
            None => false,
        }
    }
}

/// Trim, add a missing scheme and check the result parses with a host.
fn validate_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DocGateError::validation("URL is required"));
    }

    let url = urls::ensure_scheme(trimmed);
    match Url::parse(&url) {
        Ok(parsed) if parsed.host_str().is_some_and(|h| !h.is_empty()) => Ok(url),
        Ok(_) => Err(DocGateError::validation(format!("invalid URL: {trimmed}"))),
        Err(e) => Err(DocGateError::validation(format!("invalid URL {trimmed}: {e}"))),
    }
}

// ---------------------------------------------------------------------------
// One run
// ---------------------------------------------------------------------------

struct AnalysisRun {
    run: ActiveRun,
    settings: Settings,
    adapter: Option<Arc<dyn ScoringAdapter>>,
    events: mpsc::UnboundedSender<AnalysisEvent>,
    state: SharedState,
}

/// Releases the session if a run ends without reaching its normal exit,
/// i.e. it panicked or its task was aborted.
struct RunGuard {
    run: ActiveRun,
    events: mpsc::UnboundedSender<AnalysisEvent>,
    state: SharedState,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut session = lock(&self.state);
        let is_current = session
            .active
            .as_ref()
            .is_some_and(|active| active.id == self.run.id);
        if !is_current {
            return;
        }

        session.active = None;
        session.state = AnalysisState::Error;
        warn!(run_id = %self.run.id, "analysis task stopped unexpectedly");
        if !self.run.cancel.is_cancelled() {
            let _ = self.events.send(AnalysisEvent::Error {
                kind: ErrorKind::Io,
                message: "analysis task stopped unexpectedly".into(),
            });
        }
    }
}

impl AnalysisRun {
    #[instrument(skip_all, fields(run_id = %self.run.id))]
    async fn run(self, url: String, issue: String) {
        let _guard = RunGuard {
            run: self.run.clone(),
            events: self.events.clone(),
            state: Arc::clone(&self.state),
        };
        let result = self.execute(&url, &issue).await;

        // Terminal events are sent under the lock so a concurrent cancel
        // either suppresses them or happens strictly after them.
        let mut session = lock(&self.state);
        let is_current = session
            .active
            .as_ref()
            .is_some_and(|active| active.id == self.run.id);

        if self.run.cancel.is_cancelled() {
            debug!("run ended after cancellation");
            return;
        }

        match result {
            Ok(outcome) => {
                session.state = AnalysisState::Done;
                self.emit(AnalysisEvent::Progress(ProgressUpdate {
                    phase: Phase::Done,
                    message: "Done!".into(),
                    urls_found: outcome.total_scanned,
                    percent: 100,
                }));
                self.emit(AnalysisEvent::Complete(outcome));
            }
            Err(e) => {
                warn!(error = %e, "analysis failed");
                session.state = AnalysisState::Error;
                self.emit(AnalysisEvent::Error {
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }

        if is_current {
            session.active = None;
        }
    }

    /// Crawl then filter. Cancellation surfaces as an error that [`Self::run`]
    /// discards.
    async fn execute(&self, url: &str, issue: &str) -> Result<FilterOutcome> {
        let reporter = EventReporter {
            run: self,
            urls_found: AtomicUsize::new(0),
        };

        self.progress(Phase::Crawling, "Looking for a sitemap...", 0, 10);
        let crawl = crawl_site(url, &self.settings.crawl, &reporter, Some(&self.run.cancel)).await;
        self.checkpoint()?;

        let found = crawl.total_found;
        reporter.urls_found.store(found, Ordering::Relaxed);
        self.progress(
            Phase::Crawling,
            format!("Crawl complete: {found} URLs ({})", crawl.method),
            found,
            40,
        );

        if crawl.pages.is_empty() {
            for error in &crawl.errors {
                debug!(%error, "crawl error");
            }
            return Err(DocGateError::validation(NO_URLS_FOUND));
        }

        self.set_state(AnalysisState::Filtering);
        self.progress(Phase::Filtering, "Analyzing with AI...", found, 50);

        let adapter = match &self.adapter {
            Some(adapter) => Arc::clone(adapter),
            None => create_adapter(&self.settings.provider)?,
        };
        let pipeline = FilterPipeline::new(adapter, &self.settings.filter)?;
        self.checkpoint()?;

        let outcome = pipeline
            .run(&crawl.pages, issue, &reporter, Some(&self.run.cancel))
            .await;
        self.checkpoint()?;

        Ok(outcome)
    }

    fn checkpoint(&self) -> Result<()> {
        if self.run.cancel.is_cancelled() {
            return Err(DocGateError::validation("analysis cancelled"));
        }
        Ok(())
    }

    fn set_state(&self, state: AnalysisState) {
        let mut session = lock(&self.state);
        let is_current = session
            .active
            .as_ref()
            .is_some_and(|active| active.id == self.run.id);
        if is_current {
            session.state = state;
        }
    }

    fn progress(&self, phase: Phase, message: impl Into<String>, urls_found: usize, percent: u8) {
        self.emit(AnalysisEvent::Progress(ProgressUpdate {
            phase,
            message: message.into(),
            urls_found,
            percent,
        }));
    }

    fn emit(&self, event: AnalysisEvent) {
        if self.run.cancel.is_cancelled() {
            return;
        }
        // the host may have stopped listening
        let _ = self.events.send(event);
    }
}

/// Turns crawl and scoring callbacks into session events.
struct EventReporter<'a> {
    run: &'a AnalysisRun,
    urls_found: AtomicUsize,
}

impl ProgressReporter for EventReporter<'_> {
    fn pages_found(&self, count: usize) {
        self.run.progress(
            Phase::Crawling,
            format!("Found {count} URLs..."),
            count,
            30,
        );
    }

    fn batch_scored(&self, scored: usize, total: usize) {
        self.run.progress(
            Phase::Filtering,
            format!("AI scored {scored}/{total} URLs..."),
            self.urls_found.load(Ordering::Relaxed),
            scoring_percent(scored, total),
        );
    }

    fn realtime_result(&self, page: &ScoredPage, progress: BatchProgress) {
        self.run.emit(AnalysisEvent::RealtimeResult {
            page: page.clone(),
            batch_progress: progress,
        });
    }
}

/// Scoring covers the 50..=90 band of the progress bar.
fn scoring_percent(scored: usize, total: usize) -> u8 {
    if total == 0 {
        return 90;
    }
    let fraction = (scored.min(total) as f64) / (total as f64);
    50 + (fraction * 40.0).round() as u8
}
