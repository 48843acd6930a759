// file: src/pipeline/progress.rs
// description: processing statistics and the interactive progress display
// reference: uses indicatif for progress bars

use crate::pipeline::processor::{Outcome, RepoResult};
use chrono::{DateTime, Local};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Counters for one processing run.
///
/// `total` only moves together with exactly one of the other counters, so
/// `total == successful + failed + skipped` holds at every point.
#[derive(Debug, Clone)]
pub struct ProcessingStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self {
            total: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            started_at: Local::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, result: &RepoResult) {
        self.total += 1;
        match &result.outcome {
            Outcome::Success => self.successful += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Local::now) - self.started_at
    }
}

/// Live terminal display for the interactive front-end: a spinner while
/// scanning, then a bar plus a one-line detail message while processing.
/// indicatif hides everything automatically when stderr is not a terminal.
pub struct ProgressTracker {
    multi: MultiProgress,
    scan_bar: ProgressBar,
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let scan_bar = multi.add(ProgressBar::new_spinner());
        scan_bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .expect("spinner template"),
        );
        scan_bar.enable_steady_tick(Duration::from_millis(100));
        scan_bar.set_message("Scanning for git repositories...");

        let main_bar = multi.add(ProgressBar::new(0));
        main_bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("progress bar template")
                .progress_chars("█▓▒░"),
        );

        let detail_bar = multi.add(ProgressBar::new(0));
        detail_bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg}")
                .expect("detail bar template"),
        );

        Self {
            multi,
            scan_bar,
            main_bar,
            detail_bar,
        }
    }

    /// Closure for the scanner's progress callback; updates the spinner
    /// message as repositories are found.
    pub fn scan_ticker(&self) -> Box<dyn FnMut(usize) + Send> {
        let bar = self.scan_bar.clone();
        Box::new(move |count| {
            bar.set_message(format!("Scanning... {count} repositories found"));
        })
    }

    pub fn start_processing(&self, total: usize) {
        self.scan_bar
            .finish_with_message(format!("Found {total} git repositories"));
        self.main_bar.set_length(total as u64);
    }

    pub fn repo_done(&self, result: &RepoResult) {
        self.main_bar.inc(1);
        let state = match &result.outcome {
            Outcome::Success => "ok",
            Outcome::Skipped(_) => "skipped",
            Outcome::Failed(_) => "failed",
        };
        self.detail_bar
            .set_message(format!("{} [{}]", result.repo.name, state));
    }

    pub fn finish(&self) {
        if !self.scan_bar.is_finished() {
            self.scan_bar.finish_and_clear();
        }
        self.main_bar.finish_with_message("done");
        self.detail_bar.finish_and_clear();
        let _ = self.multi.clear();
    }
}
