// file: src/report/mod.rs
// description: console summaries and report/export sinks for processed results

use crate::config::Config;
use crate::error::{HerdError, Result};
use crate::pipeline::{Outcome, ProcessingStats, RepoResult};
use chrono::Local;
use colored::Colorize;
use serde_json::json;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;

const CONDENSED_WINDOW: usize = 5;

fn human_duration(duration: Duration) -> String {
    format!("{:?}", Duration::from_millis(duration.as_millis() as u64))
}

/// One console line per repository; skips and failures render distinctly,
/// dry-run successes get their own marker.
pub fn result_line(config: &Config, result: &RepoResult) -> String {
    let location = result.repo.path.display();
    match &result.outcome {
        Outcome::Failed(err) => format!(
            "{} {} ({}): {}",
            "✗".red().bold(),
            result.repo.name,
            location,
            err
        ),
        Outcome::Skipped(reason) => format!(
            "{} {} ({}): {}",
            "⊝".yellow().bold(),
            result.repo.name,
            location,
            reason
        ),
        Outcome::Success => {
            let marker = if config.dry_run {
                "●".blue().bold()
            } else {
                "✓".green().bold()
            };
            format!(
                "{} {} ({}) [{}@{}] - {}",
                marker,
                result.repo.name,
                location,
                result.branch,
                result.remote,
                human_duration(result.duration)
            )
        }
    }
}

/// Prints the end-of-run listing and totals. The listing is condensed to
/// the first and last few repositories unless `full_summary` is set.
pub fn print_summary(config: &Config, results: &[RepoResult], stats: &ProcessingStats) {
    println!();
    println!("{}", "Processing results".bold());
    println!("{}", "─".repeat(50));

    if config.full_summary || results.len() <= CONDENSED_WINDOW * 2 {
        for result in results {
            println!("{}", result_line(config, result));
        }
    } else {
        for result in &results[..CONDENSED_WINDOW] {
            println!("{}", result_line(config, result));
        }
        println!(
            "... ({} more repositories) ...",
            results.len() - CONDENSED_WINDOW * 2
        );
        for result in &results[results.len() - CONDENSED_WINDOW..] {
            println!("{}", result_line(config, result));
        }
    }

    println!("{}", "─".repeat(50));
    println!(
        "Summary: {} successful, {} failed, {} skipped, {} total",
        stats.successful.to_string().green(),
        stats.failed.to_string().red(),
        stats.skipped.to_string().yellow(),
        stats.total
    );

    if !config.full_summary && results.len() > CONDENSED_WINDOW * 2 {
        println!(
            "Use --full-summary to see all {} repositories",
            results.len()
        );
    }
}

/// Writes the detailed plain-text report.
pub fn write_text_report(
    path: &Path,
    config: &Config,
    results: &[RepoResult],
    stats: &ProcessingStats,
) -> Result<()> {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "repoherd report - {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "Operation: {}", config.operation);
    let _ = writeln!(out, "Workers: {}", config.workers);
    let _ = writeln!(out, "Total repositories: {}", stats.total);
    let _ = writeln!(
        out,
        "Successful: {}, Failed: {}, Skipped: {}\n",
        stats.successful, stats.failed, stats.skipped
    );
    let _ = writeln!(out, "Repository details:");
    let _ = writeln!(out, "==================\n");

    for result in results {
        let _ = writeln!(out, "Repository: {}", result.repo.name);
        let _ = writeln!(out, "Path: {}", result.repo.path.display());
        if !result.branch.is_empty() {
            let _ = writeln!(out, "Branch: {}", result.branch);
        }
        if !result.remote.is_empty() {
            let _ = writeln!(out, "Remote: {}", result.remote);
        }
        let _ = writeln!(out, "Duration: {}", human_duration(result.duration));
        match &result.outcome {
            Outcome::Failed(err) => {
                let _ = writeln!(out, "Status: FAILED - {err}");
            }
            Outcome::Skipped(reason) => {
                let _ = writeln!(out, "Status: SKIPPED - {reason}");
            }
            Outcome::Success if config.dry_run => {
                let _ = writeln!(out, "Status: DRY RUN - would have succeeded");
            }
            Outcome::Success => {
                let _ = writeln!(out, "Status: SUCCESS");
            }
        }
        let _ = writeln!(out);
    }

    fs::write(path, out)?;
    Ok(())
}

/// Exports scan results as a markdown document.
pub fn export_markdown(path: &Path, results: &[RepoResult]) -> Result<()> {
    let mut out = String::new();
    let _ = writeln!(out, "# Git Repository Scan Report\n");
    let _ = writeln!(
        out,
        "Generated: {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "Total repositories: {}\n", results.len());
    let _ = writeln!(out, "---\n");

    for result in results {
        let _ = writeln!(out, "## {}\n", result.repo.name);
        let _ = writeln!(out, "**Path:** `{}`\n", result.repo.path.display());
        if !result.branch.is_empty() {
            let _ = writeln!(out, "**Branch:** {}\n", result.branch);
        }
        if !result.remote.is_empty() {
            let _ = writeln!(out, "**Remote:** {}\n", result.remote);
        }
        if !result.last_commit.is_empty() {
            let _ = writeln!(out, "**Last commit:** `{}`\n", result.last_commit);
            if !result.last_commit_msg.is_empty() {
                let _ = writeln!(out, "**Commit message:** {}\n", result.last_commit_msg);
            }
        }
        if result.modified_files.is_empty() {
            let _ = writeln!(out, "**Status:** Clean (no local changes)\n");
        } else {
            let _ = writeln!(out, "**Modified files:**\n");
            for file in &result.modified_files {
                let _ = writeln!(out, "- `{file}`");
            }
            let _ = writeln!(out);
        }
        if let Outcome::Failed(err) = &result.outcome {
            let _ = writeln!(out, "**Error:** {err}\n");
        }
        let _ = writeln!(out, "---\n");
    }

    fs::write(path, out)?;
    Ok(())
}

/// Exports scan results as structured JSON.
pub fn export_json(
    path: &Path,
    config: &Config,
    results: &[RepoResult],
    stats: &ProcessingStats,
) -> Result<()> {
    let repositories: Vec<serde_json::Value> = results
        .iter()
        .map(|result| {
            json!({
                "name": result.repo.name,
                "path": result.repo.path.display().to_string(),
                "branch": result.branch,
                "remote": result.remote,
                "clean": result.clean,
                "last_commit": result.last_commit,
                "last_commit_message": result.last_commit_msg,
                "modified_files": result.modified_files,
                "duration_ms": result.duration.as_millis() as u64,
                "outcome": outcome_value(&result.outcome),
            })
        })
        .collect();

    let document = json!({
        "generated_at": Local::now().to_rfc3339(),
        "operation": config.operation.to_string(),
        "stats": {
            "total": stats.total,
            "successful": stats.successful,
            "failed": stats.failed,
            "skipped": stats.skipped,
        },
        "repositories": repositories,
    });

    let rendered = serde_json::to_string_pretty(&document)
        .map_err(|e| HerdError::Serialization(e.to_string()))?;
    fs::write(path, rendered)?;
    Ok(())
}

fn outcome_value(outcome: &Outcome) -> serde_json::Value {
    match outcome {
        Outcome::Success => json!({"status": "success"}),
        Outcome::Skipped(reason) => json!({"status": "skipped", "reason": reason}),
        Outcome::Failed(err) => json!({"status": "failed", "error": err.to_string()}),
    }
}
