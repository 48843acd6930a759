// file: src/pipeline/dispatch.rs
// description: incremental dispatch state machine for the interactive front-end
// reference: event-driven control loop with a fixed-size in-flight window

use crate::config::Config;
use crate::error::{HerdError, Result};
use crate::pipeline::processor::{RepoProcessor, RepoResult};
use crate::pipeline::progress::{ProcessingStats, ProgressTracker};
use crate::repository::{RepoEntry, RepoScanner};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifecycle phase of the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Scanning,
    Processing,
    Complete,
}

/// Everything that can happen to the loop, as a typed union.
#[derive(Debug)]
pub enum Event {
    ScanFinished(Result<Vec<RepoEntry>>),
    RepoDone(RepoResult),
    Quit,
}

/// Side effects requested by a transition. Returned as data so the
/// transition logic stays free of I/O; the driver loop executes them.
#[derive(Debug)]
pub enum Effect {
    Scan,
    Dispatch(RepoEntry),
    Finish,
}

/// Bookkeeping for the at-most-N-in-flight window.
///
/// While in [`Phase::Processing`] the window holds exactly
/// `min(workers, remaining undispatched)` outstanding operations: entering
/// the phase issues the initial batch, and every completed repository
/// issues at most one replacement.
pub struct DispatchState {
    workers: usize,
    phase: Phase,
    entries: Vec<RepoEntry>,
    next_index: usize,
    processed: usize,
    results: Vec<RepoResult>,
    scan_error: Option<HerdError>,
}

impl DispatchState {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            phase: Phase::Initializing,
            entries: Vec::new(),
            next_index: 0,
            processed: 0,
            results: Vec::new(),
            scan_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn results(&self) -> &[RepoResult] {
        &self.results
    }

    /// Operations dispatched but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.next_index - self.processed
    }

    /// Consumes the state, yielding retained results and the scan error,
    /// if the scan is what ended the run.
    pub fn into_results(self) -> (Vec<RepoResult>, Option<HerdError>) {
        (self.results, self.scan_error)
    }

    /// Entry transition: issue the scan request.
    pub fn start(&mut self) -> Vec<Effect> {
        self.phase = Phase::Scanning;
        vec![Effect::Scan]
    }

    /// The transition function. No I/O happens here; requested side
    /// effects come back as data.
    pub fn apply(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::ScanFinished(Ok(entries)) => {
                self.entries = entries;
                if self.entries.is_empty() {
                    self.phase = Phase::Complete;
                    return vec![Effect::Finish];
                }
                self.phase = Phase::Processing;
                let initial = self.workers.min(self.entries.len());
                (0..initial).filter_map(|_| self.dispatch_next()).collect()
            }

            Event::ScanFinished(Err(err)) => {
                self.scan_error = Some(err);
                self.phase = Phase::Complete;
                vec![Effect::Finish]
            }

            Event::RepoDone(result) => {
                self.results.push(result);
                self.processed += 1;
                if self.processed >= self.entries.len() {
                    self.phase = Phase::Complete;
                    return vec![Effect::Finish];
                }
                self.dispatch_next().into_iter().collect()
            }

            Event::Quit => {
                // results delivered so far are retained
                self.phase = Phase::Complete;
                vec![Effect::Finish]
            }
        }
    }

    fn dispatch_next(&mut self) -> Option<Effect> {
        let entry = self.entries.get(self.next_index)?.clone();
        self.next_index += 1;
        Some(Effect::Dispatch(entry))
    }
}

/// Driver for [`DispatchState`]: a single-threaded, message-driven loop.
///
/// The loop never blocks on repository work; scan and per-repository
/// operations run on blocking tasks and report back over one channel, so
/// the loop body is never re-entered concurrently with itself.
pub struct DispatchLoop {
    config: Arc<Config>,
    processor: Arc<RepoProcessor>,
    cancel: CancellationToken,
    progress: Option<ProgressTracker>,
}

impl DispatchLoop {
    pub fn new(
        config: Arc<Config>,
        processor: Arc<RepoProcessor>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            processor,
            cancel,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = Some(progress);
        self
    }

    pub async fn run(self, root: PathBuf) -> Result<(Vec<RepoResult>, ProcessingStats)> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let mut state = DispatchState::new(self.config.workers);
        let mut stats = ProcessingStats::new();

        let mut effects = state.start();
        loop {
            for effect in effects.drain(..) {
                match effect {
                    Effect::Scan => self.spawn_scan(root.clone(), tx.clone()),
                    Effect::Dispatch(entry) => self.spawn_process(entry, tx.clone()),
                    Effect::Finish => debug!("dispatch loop finishing"),
                }
            }
            if state.phase() == Phase::Complete {
                break;
            }

            let event = tokio::select! {
                () = self.cancel.cancelled() => Event::Quit,
                received = rx.recv() => match received {
                    Some(event) => event,
                    None => Event::Quit,
                },
            };

            match &event {
                Event::ScanFinished(Ok(entries)) => {
                    if let Some(progress) = &self.progress {
                        progress.start_processing(entries.len());
                    }
                }
                Event::RepoDone(result) => {
                    stats.record(result);
                    if let Some(progress) = &self.progress {
                        progress.repo_done(result);
                    }
                }
                _ => {}
            }

            effects = state.apply(event);
        }

        stats.finish();
        if let Some(progress) = &self.progress {
            progress.finish();
        }

        let (results, scan_error) = state.into_results();
        match scan_error {
            Some(err) => Err(err),
            None => Ok((results, stats)),
        }
    }

    fn spawn_scan(&self, root: PathBuf, tx: mpsc::UnboundedSender<Event>) {
        let scanner = RepoScanner::new(self.config.clone());
        let cancel = self.cancel.clone();
        let on_progress = self.progress.as_ref().map(|p| p.scan_ticker());
        tokio::task::spawn_blocking(move || {
            let found = scanner.find_repos(&cancel, &root, on_progress);
            let _ = tx.send(Event::ScanFinished(found));
        });
    }

    fn spawn_process(&self, entry: RepoEntry, tx: mpsc::UnboundedSender<Event>) {
        let processor = self.processor.clone();
        let cancel = self.cancel.clone();
        tokio::task::spawn_blocking(move || {
            let result = processor.process(&cancel, entry);
            // the loop may already have quit; a dropped receiver is fine
            let _ = tx.send(Event::RepoDone(result));
        });
    }
}
