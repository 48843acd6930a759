// file: src/pipeline/processor.rs
// description: per-repository operation pipeline
// reference: analyze, discard, gate, then dispatch the configured operation

use crate::config::{Config, Operation};
use crate::error::{HerdError, Result};
use crate::repository::{GitBackend, RepoEntry, RepoStatus};
use glob::Pattern;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Terminal outcome of processing one repository.
#[derive(Debug)]
pub enum Outcome {
    Success,
    Skipped(String),
    Failed(HerdError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Everything known about one repository after its pipeline ran.
/// Produced exactly once per discovered entry.
#[derive(Debug)]
pub struct RepoResult {
    pub repo: RepoEntry,
    pub branch: String,
    pub remote: String,
    pub clean: bool,
    pub last_commit: String,
    pub last_commit_msg: String,
    pub modified_files: Vec<String>,
    pub duration: Duration,
    pub outcome: Outcome,
}

impl RepoResult {
    fn from_status(repo: RepoEntry, status: RepoStatus, duration: Duration, outcome: Outcome) -> Self {
        Self {
            repo,
            branch: status.branch,
            remote: status.remote,
            clean: status.clean,
            last_commit: status.last_commit,
            last_commit_msg: status.last_commit_msg,
            modified_files: status.modified_files,
            duration,
            outcome,
        }
    }
}

pub struct RepoProcessor {
    config: Arc<Config>,
    backend: Arc<dyn GitBackend>,
}

impl RepoProcessor {
    pub fn new(config: Arc<Config>, backend: Arc<dyn GitBackend>) -> Self {
        Self { config, backend }
    }

    /// Runs the full pipeline for one repository. Never fails outward:
    /// every error ends up in the result's outcome, so one repository can
    /// never affect the processing of another.
    pub fn process(&self, cancel: &CancellationToken, repo: RepoEntry) -> RepoResult {
        let started = Instant::now();
        let (status, outcome) = self.run_pipeline(cancel, &repo);
        let result = RepoResult::from_status(repo, status, started.elapsed(), outcome);
        match &result.outcome {
            Outcome::Success => debug!("processed {}", result.repo.name),
            Outcome::Skipped(reason) => debug!("skipped {}: {}", result.repo.name, reason),
            Outcome::Failed(err) => warn!("failed {}: {}", result.repo.name, err),
        }
        result
    }

    fn run_pipeline(&self, cancel: &CancellationToken, repo: &RepoEntry) -> (RepoStatus, Outcome) {
        if cancel.is_cancelled() {
            return (RepoStatus::default(), Outcome::Failed(HerdError::Cancelled));
        }

        let mut status = match self.backend.status(&repo.path) {
            Ok(status) => status,
            Err(err) => return (RepoStatus::default(), Outcome::Failed(err)),
        };

        if !self.config.discard_files.is_empty() && !status.clean {
            if let Err(err) = self.discard_matching(repo, &status) {
                return (status, Outcome::Failed(err));
            }
            // discarding may have turned the tree clean
            status = match self.backend.status(&repo.path) {
                Ok(refreshed) => refreshed,
                Err(err) => return (status, Outcome::Failed(err)),
            };
        }

        if self.config.skip_dirty && !status.clean && self.config.operation != Operation::Scan {
            return (
                status,
                Outcome::Skipped("repository has uncommitted changes".to_string()),
            );
        }

        if self.config.dry_run {
            return (status, Outcome::Success);
        }

        let dispatched = match self.config.operation {
            Operation::Fetch => self.backend.fetch(cancel, &repo.path),
            Operation::Pull => self.backend.pull(cancel, &repo.path),
            Operation::Scan => Ok(()),
        };

        match dispatched {
            Ok(()) => (status, Outcome::Success),
            Err(err) => (status, Outcome::Failed(err)),
        }
    }

    fn discard_matching(&self, repo: &RepoEntry, status: &RepoStatus) -> Result<()> {
        for file in &status.modified_files {
            if self.matches_discard_pattern(file) {
                debug!("discarding changes to {} in {}", file, repo.name);
                self.backend.discard(&repo.path, file)?;
            }
        }
        Ok(())
    }

    /// Exact path or base-name match wins first; otherwise the pattern is
    /// tried as a glob against the base name.
    fn matches_discard_pattern(&self, file: &str) -> bool {
        let base = Path::new(file)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.to_string());

        self.config.discard_files.iter().any(|pattern| {
            file == pattern
                || base == *pattern
                || Pattern::new(pattern)
                    .map(|p| p.matches(&base))
                    .unwrap_or(false)
        })
    }
}
