// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{HerdError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The bulk operation applied to every discovered repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Download remote changes without touching the working tree.
    Fetch,
    /// Fetch and fast-forward the current branch.
    Pull,
    /// Inspect repositories only; no network writes, no mutation.
    Scan,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Fetch => write!(f, "fetch"),
            Operation::Pull => write!(f, "pull"),
            Operation::Scan => write!(f, "scan"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub operation: Operation,
    pub workers: usize,
    pub dry_run: bool,
    pub recursive: bool,
    pub skip_dirty: bool,
    pub verbose: bool,
    /// Overall deadline in seconds; 0 disables the deadline.
    pub timeout_secs: u64,
    /// A directory is skipped (with its whole subtree) when its path
    /// contains any of these tokens as a substring.
    pub exclude_dirs: Vec<String>,
    pub plain: bool,
    pub full_summary: bool,
    pub save_report: Option<PathBuf>,
    /// File name patterns whose working-tree changes are reverted before a
    /// mutating operation runs. Exact names or globs, e.g. `package-lock.json`
    /// or `*.lock`.
    pub discard_files: Vec<String>,
    pub export_scan: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            operation: Operation::Fetch,
            workers: 5,
            dry_run: false,
            recursive: true,
            skip_dirty: true,
            verbose: false,
            timeout_secs: 300,
            exclude_dirs: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                "vendor".to_string(),
            ],
            plain: false,
            full_summary: false,
            save_report: None,
            discard_files: Vec::new(),
            export_scan: None,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file and `REPOHERD_*` environment
    /// variables. With no explicit path, `repoherd.toml` in the working
    /// directory is used when present. Callers apply CLI overrides on top
    /// and then run [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::with_name("repoherd").required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("REPOHERD")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| HerdError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| HerdError::Config(e.to_string()))
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(HerdError::Config(
                "workers must be greater than 0".to_string(),
            ));
        }

        if self.export_scan.is_some() && self.operation != Operation::Scan {
            return Err(HerdError::Config(
                "export-scan requires the scan operation".to_string(),
            ));
        }

        Ok(())
    }
}
