// file: src/pipeline/testutil.rs
// description: programmable fake backend and fixtures for pipeline tests

use crate::error::{HerdError, Result};
use crate::pipeline::processor::{Outcome, RepoResult};
use crate::repository::{GitBackend, RepoEntry, RepoStatus};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Builds a result without running any pipeline, for state-machine and
/// reporting tests.
pub(crate) fn fabricated_result(name: &str, outcome: Outcome) -> RepoResult {
    RepoResult {
        repo: RepoEntry {
            path: PathBuf::from(format!("/repos/{name}")),
            name: name.to_string(),
            has_git: true,
        },
        branch: "main".to_string(),
        remote: "origin".to_string(),
        clean: true,
        last_commit: "abcd1234".to_string(),
        last_commit_msg: "test commit".to_string(),
        modified_files: Vec::new(),
        duration: Duration::from_millis(1),
        outcome,
    }
}

struct Gate {
    open: Mutex<bool>,
    released: Condvar,
}

/// In-memory [`GitBackend`] with programmable statuses, failure injection,
/// artificial latency and a gate for deterministic cancellation tests.
/// Also tracks how many status calls are in flight at once.
pub(crate) struct FakeBackend {
    statuses: Mutex<Vec<RepoStatus>>,
    fail_status: bool,
    fail_discard: bool,
    fail_paths: Vec<PathBuf>,
    status_delay: Option<Duration>,
    gate: Option<Gate>,
    discarded: Mutex<Vec<String>>,
    fetches: AtomicUsize,
    pulls: AtomicUsize,
    current: AtomicUsize,
    max: AtomicUsize,
}

impl FakeBackend {
    pub(crate) fn clean_status() -> RepoStatus {
        RepoStatus {
            branch: "main".to_string(),
            remote: "origin".to_string(),
            clean: true,
            last_commit: "abcd1234".to_string(),
            last_commit_msg: "test commit".to_string(),
            modified_files: Vec::new(),
        }
    }

    pub(crate) fn dirty_status(files: Vec<&str>) -> RepoStatus {
        RepoStatus {
            clean: false,
            modified_files: files.into_iter().map(str::to_string).collect(),
            ..Self::clean_status()
        }
    }

    pub(crate) fn with_statuses(statuses: Vec<RepoStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses),
            fail_status: false,
            fail_discard: false,
            fail_paths: Vec::new(),
            status_delay: None,
            gate: None,
            discarded: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            pulls: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
            max: AtomicUsize::new(0),
        }
    }

    pub(crate) fn clean() -> Self {
        Self::with_statuses(vec![Self::clean_status()])
    }

    pub(crate) fn dirty(files: Vec<&str>) -> Self {
        Self::with_statuses(vec![Self::dirty_status(files)])
    }

    /// Every status call fails, as for an unopenable repository.
    pub(crate) fn broken() -> Self {
        Self {
            fail_status: true,
            ..Self::clean()
        }
    }

    pub(crate) fn failing_discard(mut self) -> Self {
        self.fail_discard = true;
        self
    }

    /// Status fails only for the given repository path.
    pub(crate) fn failing_for(mut self, path: &str) -> Self {
        self.fail_paths.push(PathBuf::from(path));
        self
    }

    pub(crate) fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = Some(delay);
        self
    }

    /// Status calls block until [`FakeBackend::open_gate`] is called.
    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Gate {
            open: Mutex::new(false),
            released: Condvar::new(),
        });
        self
    }

    pub(crate) fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            *gate.open.lock().unwrap() = true;
            gate.released.notify_all();
        }
    }

    pub(crate) fn discarded(&self) -> Vec<String> {
        self.discarded.lock().unwrap().clone()
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    fn next_status(&self, path: &Path) -> Result<RepoStatus> {
        if let Some(gate) = &self.gate {
            let mut open = gate.open.lock().unwrap();
            while !*open {
                open = gate.released.wait(open).unwrap();
            }
        }
        if let Some(delay) = self.status_delay {
            std::thread::sleep(delay);
        }
        if self.fail_status || self.fail_paths.iter().any(|p| p == path) {
            return Err(HerdError::Git(git2::Error::from_str(
                "synthetic status failure",
            )));
        }

        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            Ok(statuses.remove(0))
        } else {
            Ok(statuses.first().cloned().unwrap_or_else(Self::clean_status))
        }
    }
}

impl GitBackend for FakeBackend {
    fn status(&self, path: &Path) -> Result<RepoStatus> {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(current, Ordering::SeqCst);
        let status = self.next_status(path);
        self.current.fetch_sub(1, Ordering::SeqCst);
        status
    }

    fn discard(&self, _path: &Path, file: &str) -> Result<()> {
        if self.fail_discard {
            return Err(HerdError::Discard {
                file: file.to_string(),
                source: git2::Error::from_str("synthetic discard failure"),
            });
        }
        self.discarded.lock().unwrap().push(file.to_string());
        Ok(())
    }

    fn fetch(&self, cancel: &CancellationToken, _path: &Path) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(HerdError::Cancelled);
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pull(&self, cancel: &CancellationToken, _path: &Path) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(HerdError::Cancelled);
        }
        self.pulls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
