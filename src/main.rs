// file: src/main.rs
// description: commandline application entry point
// reference: application bootstrap, front-end selection, exit-code policy

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use repoherd::report;
use repoherd::{
    Config, DispatchLoop, Git2Backend, Operation, Orchestrator, ProcessingStats, ProgressTracker,
    RepoProcessor, RepoResult, RepoScanner,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Parser)]
#[command(name = "repoherd")]
#[command(version)]
#[command(about = "Bulk git operations on multiple repositories")]
#[command(
    long_about = "repoherd performs a git operation (fetch, pull, or scan) on every git\nrepository found under the given directory."
)]
struct Cli {
    /// Directory to scan (defaults to the current directory)
    path: Option<PathBuf>,

    /// Operation to perform
    #[arg(short, long, value_enum)]
    operation: Option<Operation>,

    /// Number of concurrent workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Show what would be done without contacting any remote
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Keep descending below discovered repositories
    #[arg(short, long, action = ArgAction::Set, value_name = "BOOL")]
    recursive: Option<bool>,

    /// Skip repositories with uncommitted changes
    #[arg(short, long, action = ArgAction::Set, value_name = "BOOL")]
    skip_dirty: Option<bool>,

    /// Enable verbose logging (implies plain output)
    #[arg(short, long)]
    verbose: bool,

    /// Overall timeout in seconds (0 disables it)
    #[arg(short, long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Directories to exclude (path substring match)
    #[arg(short, long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Plain text output instead of the progress display
    #[arg(short, long)]
    plain: bool,

    /// List every repository in the final summary
    #[arg(short, long)]
    full_summary: bool,

    /// Save a detailed report to a file
    #[arg(long, value_name = "FILE")]
    save_report: Option<PathBuf>,

    /// File patterns to discard changes for before pull/fetch
    /// (e.g. package.json,package-lock.json)
    #[arg(short = 'd', long, value_delimiter = ',')]
    discard_files: Vec<String>,

    /// Export scan results to a markdown or .json file (requires -o scan)
    #[arg(long, value_name = "FILE")]
    export_scan: Option<PathBuf>,

    /// Configuration file (defaults to repoherd.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Colored output
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    color: bool,
}

impl Cli {
    /// Flags override whatever the config file and environment provided.
    fn apply(&self, config: &mut Config) {
        if let Some(operation) = self.operation {
            config.operation = operation;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if let Some(recursive) = self.recursive {
            config.recursive = recursive;
        }
        if let Some(skip_dirty) = self.skip_dirty {
            config.skip_dirty = skip_dirty;
        }
        if self.verbose {
            config.verbose = true;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if !self.exclude.is_empty() {
            config.exclude_dirs = self.exclude.clone();
        }
        if self.plain {
            config.plain = true;
        }
        if self.full_summary {
            config.full_summary = true;
        }
        if let Some(path) = &self.save_report {
            config.save_report = Some(path.clone());
        }
        if !self.discard_files.is_empty() {
            config.discard_files = self.discard_files.clone();
        }
        if let Some(path) = &self.export_scan {
            config.export_scan = Some(path.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    colored::control::set_override(cli.color);

    let mut config =
        Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    repoherd::utils::logging::init_logger(cli.color, config.verbose);

    let root = cli.path.clone().unwrap_or_else(|| PathBuf::from("."));
    let meta = std::fs::metadata(&root)
        .with_context(|| format!("cannot access {}", root.display()))?;
    if !meta.is_dir() {
        bail!("path is not a directory: {}", root.display());
    }

    let config = Arc::new(config);
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }
    if let Some(timeout) = config.timeout() {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            cancel.cancel();
        });
    }

    let processor = Arc::new(RepoProcessor::new(config.clone(), Arc::new(Git2Backend)));

    // verbose logging and the live display fight over the terminal, so
    // verbose implies plain mode
    let (results, stats) = if config.plain || config.verbose {
        run_plain(&config, processor, &cancel, &root).await?
    } else {
        run_interactive(&config, processor, &cancel, root.clone()).await?
    };

    report::print_summary(&config, &results, &stats);

    if let Some(path) = &config.save_report {
        report::write_text_report(path, &config, &results, &stats)
            .context("failed to save report")?;
        println!("Report saved to {}", path.display());
    }

    if let Some(path) = &config.export_scan {
        if path.extension().is_some_and(|ext| ext == "json") {
            report::export_json(path, &config, &results, &stats)
                .context("failed to export scan")?;
        } else {
            report::export_markdown(path, &results).context("failed to export scan")?;
        }
        println!("Scan exported to {}", path.display());
    }

    if stats.failed > 0 {
        bail!("{} repositories failed", stats.failed);
    }
    Ok(())
}

async fn run_plain(
    config: &Arc<Config>,
    processor: Arc<RepoProcessor>,
    cancel: &CancellationToken,
    root: &Path,
) -> Result<(Vec<RepoResult>, ProcessingStats)> {
    println!("Scanning for git repositories in {}...", root.display());

    let scanner = RepoScanner::new(config.clone());
    let scan_cancel = cancel.clone();
    let scan_root = root.to_path_buf();
    let entries = tokio::task::spawn_blocking(move || {
        scanner.find_repos(
            &scan_cancel,
            &scan_root,
            Some(Box::new(|count| {
                if count % 10 == 0 {
                    println!("   found {count} repositories so far...");
                }
            })),
        )
    })
    .await
    .context("scan task failed")??;

    println!("Scan complete: found {} git repositories", entries.len());
    if entries.is_empty() {
        let mut stats = ProcessingStats::new();
        stats.finish();
        return Ok((Vec::new(), stats));
    }

    let orchestrator = Orchestrator::new(config.clone(), processor);
    let run = orchestrator.run(cancel, entries, |result| {
        debug!("completed {}", result.repo.name);
    });
    Ok(run.await?)
}

async fn run_interactive(
    config: &Arc<Config>,
    processor: Arc<RepoProcessor>,
    cancel: &CancellationToken,
    root: PathBuf,
) -> Result<(Vec<RepoResult>, ProcessingStats)> {
    let dispatch = DispatchLoop::new(config.clone(), processor, cancel.clone())
        .with_progress(ProgressTracker::new());
    Ok(dispatch.run(root).await?)
}
