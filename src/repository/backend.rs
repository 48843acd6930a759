// file: src/repository/backend.rs
// description: Repository access built on git2
// reference: https://docs.rs/git2

use crate::error::{HerdError, Result};
use git2::build::CheckoutBuilder;
use git2::{FetchOptions, RemoteCallbacks, Repository, StatusOptions};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Sentinel branch name reported when HEAD does not point at a branch.
pub const DETACHED: &str = "detached";

/// Snapshot of a repository's state as reported by [`GitBackend::status`].
#[derive(Debug, Clone, Default)]
pub struct RepoStatus {
    pub branch: String,
    pub remote: String,
    pub clean: bool,
    /// Short (8 character) hash of the last commit, empty when unavailable.
    pub last_commit: String,
    /// First line of the last commit message.
    pub last_commit_msg: String,
    pub modified_files: Vec<String>,
}

/// Access to a single repository on disk.
///
/// Every method opens the repository at `path` itself; handles are not held
/// across calls, so concurrent operations on different repositories never
/// share state. Network operations must observe `cancel` at their blocking
/// transfer points.
pub trait GitBackend: Send + Sync {
    fn status(&self, path: &Path) -> Result<RepoStatus>;
    fn discard(&self, path: &Path, file: &str) -> Result<()>;
    fn fetch(&self, cancel: &CancellationToken, path: &Path) -> Result<()>;
    fn pull(&self, cancel: &CancellationToken, path: &Path) -> Result<()>;
}

/// Production [`GitBackend`] implementation on top of libgit2.
pub struct Git2Backend;

impl Git2Backend {
    fn callbacks(cancel: &CancellationToken) -> RemoteCallbacks<'static> {
        let token = cancel.clone();
        let mut callbacks = RemoteCallbacks::new();
        // Returning false aborts the transfer, which is how cancellation
        // reaches an in-flight network operation.
        callbacks.transfer_progress(move |_| !token.is_cancelled());
        callbacks
    }

    fn worktree_is_clean(repo: &Repository) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true);
        Ok(repo.statuses(Some(&mut opts))?.is_empty())
    }
}

impl GitBackend for Git2Backend {
    fn status(&self, path: &Path) -> Result<RepoStatus> {
        let repo = Repository::open(path)?;
        let head = repo.head()?;

        let branch = if head.is_branch() {
            head.shorthand().unwrap_or(DETACHED).to_string()
        } else {
            DETACHED.to_string()
        };

        let (last_commit, last_commit_msg) = match head.peel_to_commit() {
            Ok(commit) => {
                let id = commit.id().to_string();
                (
                    id[..8].to_string(),
                    commit.summary().unwrap_or_default().to_string(),
                )
            }
            Err(_) => (String::new(), String::new()),
        };

        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let statuses = repo.statuses(Some(&mut opts))?;
        let modified_files: Vec<String> = statuses
            .iter()
            .filter_map(|entry| entry.path().map(str::to_string))
            .collect();
        let clean = modified_files.is_empty();

        let remote = repo
            .remotes()?
            .get(0)
            .map(str::to_string)
            .unwrap_or_default();

        Ok(RepoStatus {
            branch,
            remote,
            clean,
            last_commit,
            last_commit_msg,
            modified_files,
        })
    }

    fn discard(&self, path: &Path, file: &str) -> Result<()> {
        let repo = Repository::open(path)?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force().path(file);
        repo.checkout_head(Some(&mut checkout))
            .map_err(|source| HerdError::Discard {
                file: file.to_string(),
                source,
            })
    }

    fn fetch(&self, cancel: &CancellationToken, path: &Path) -> Result<()> {
        let repo = Repository::open(path)?;
        let mut remote = repo.find_remote("origin")?;

        let mut opts = FetchOptions::new();
        opts.remote_callbacks(Self::callbacks(cancel));

        // An empty refspec list fetches the remote's configured refspecs;
        // a fetch with nothing new succeeds, so up-to-date is not an error.
        let refspecs: [&str; 0] = [];
        remote.fetch(&refspecs, Some(&mut opts), None)?;
        debug!("fetched origin for {}", path.display());
        Ok(())
    }

    fn pull(&self, cancel: &CancellationToken, path: &Path) -> Result<()> {
        let repo = Repository::open(path)?;

        if !Self::worktree_is_clean(&repo)? {
            return Err(HerdError::Git(git2::Error::from_str(
                "cannot pull into a dirty working tree",
            )));
        }

        let head = repo.head()?;
        if !head.is_branch() {
            return Err(HerdError::Git(git2::Error::from_str(
                "cannot pull with a detached HEAD",
            )));
        }
        let branch = head.shorthand().unwrap_or_default().to_string();

        let mut remote = repo.find_remote("origin")?;
        let mut opts = FetchOptions::new();
        opts.remote_callbacks(Self::callbacks(cancel));
        remote.fetch(&[branch.as_str()], Some(&mut opts), None)?;

        let fetch_head = repo.find_reference("FETCH_HEAD")?;
        let fetch_commit = repo.reference_to_annotated_commit(&fetch_head)?;
        let (analysis, _) = repo.merge_analysis(&[&fetch_commit])?;

        if analysis.is_up_to_date() {
            debug!("{} already up to date", path.display());
            return Ok(());
        }

        if analysis.is_fast_forward() {
            let refname = format!("refs/heads/{branch}");
            let mut reference = repo.find_reference(&refname)?;
            reference.set_target(fetch_commit.id(), "fast-forward")?;
            repo.set_head(&refname)?;
            repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
            debug!("fast-forwarded {} to {}", branch, fetch_commit.id());
            return Ok(());
        }

        Err(HerdError::Git(git2::Error::from_str(
            "pull requires a manual merge",
        )))
    }
}
