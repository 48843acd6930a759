// file: src/repository/scanner.rs
// description: Directory walking and repository discovery with exclusion rules
// reference: https://docs.rs/walkdir

use crate::config::Config;
use crate::error::{HerdError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Callback invoked after each find with the running repository count.
/// Purely informational; it never affects the returned list.
pub type ScanProgress = Box<dyn FnMut(usize) + Send>;

/// Identifies a discovered git repository by path and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEntry {
    pub path: PathBuf,
    pub name: String,
    pub has_git: bool,
}

impl RepoEntry {
    pub fn new(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path: path.to_path_buf(),
            name,
            has_git: true,
        }
    }
}

pub struct RepoScanner {
    config: Arc<Config>,
}

impl RepoScanner {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Discovers git repositories under `root` in pre-order.
    ///
    /// A directory whose path contains an exclusion token is skipped with
    /// its whole subtree. A directory that directly contains `.git` is
    /// recorded; unless the configuration is recursive, its subtree is not
    /// descended further. Any filesystem error aborts the entire walk.
    pub fn find_repos(
        &self,
        cancel: &CancellationToken,
        root: &Path,
        mut on_progress: Option<ScanProgress>,
    ) -> Result<Vec<RepoEntry>> {
        info!("Scanning for git repositories under {}", root.display());
        let mut repos = Vec::new();
        let mut walker = WalkDir::new(root).follow_links(false).into_iter();

        while let Some(entry) = walker.next() {
            if cancel.is_cancelled() {
                return Err(HerdError::Cancelled);
            }

            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            if self.is_excluded(path) {
                debug!("excluding {}", path.display());
                walker.skip_current_dir();
                continue;
            }

            if path.join(".git").exists() {
                repos.push(RepoEntry::new(path));
                if let Some(report) = on_progress.as_mut() {
                    report(repos.len());
                }
                if !self.config.recursive {
                    walker.skip_current_dir();
                }
            }
        }

        info!("Found {} git repositories", repos.len());
        Ok(repos)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.config
            .exclude_dirs
            .iter()
            .any(|token| path_str.contains(token.as_str()))
    }
}
