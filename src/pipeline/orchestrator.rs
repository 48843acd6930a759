// file: src/pipeline/orchestrator.rs
// description: bounded worker pool for batch processing
// reference: fans descriptors out to concurrent pipelines, fans results back in

use crate::config::Config;
use crate::error::{HerdError, Result};
use crate::pipeline::processor::{RepoProcessor, RepoResult};
use crate::pipeline::progress::ProcessingStats;
use crate::repository::RepoEntry;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Batch front-end: processes every entry with at most `workers` pipelines
/// in flight, collecting results in completion order.
pub struct Orchestrator {
    config: Arc<Config>,
    processor: Arc<RepoProcessor>,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>, processor: Arc<RepoProcessor>) -> Self {
        Self { config, processor }
    }

    /// Runs the pool to completion. `on_result` observes each result as it
    /// arrives, before ordering-insensitive aggregation.
    ///
    /// Fails only when submission is impossible (token already cancelled
    /// before any work starts). Per-repository failures land in that
    /// repository's outcome and never abort the run. Entries that have not
    /// started when cancellation fires produce no result at all; entries
    /// already in flight run to completion and are retained.
    pub async fn run<F>(
        &self,
        cancel: &CancellationToken,
        entries: Vec<RepoEntry>,
        mut on_result: F,
    ) -> Result<(Vec<RepoResult>, ProcessingStats)>
    where
        F: FnMut(&RepoResult),
    {
        if cancel.is_cancelled() {
            return Err(HerdError::Cancelled);
        }

        let mut stats = ProcessingStats::new();
        if entries.is_empty() {
            stats.finish();
            return Ok((Vec::new(), stats));
        }

        info!(
            "Processing {} repositories with {} workers",
            entries.len(),
            self.config.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let (tx, mut rx) = mpsc::channel::<RepoResult>(entries.len());

        // submission preserves discovery order; the semaphore enforces the
        // in-flight high-water mark
        for entry in entries {
            let semaphore = semaphore.clone();
            let processor = self.processor.clone();
            let cancel = cancel.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                if cancel.is_cancelled() {
                    // cancelled before this entry started: it never
                    // produces a result
                    return;
                }
                let task_cancel = cancel.clone();
                match tokio::task::spawn_blocking(move || processor.process(&task_cancel, entry))
                    .await
                {
                    Ok(result) => {
                        let _ = tx.send(result).await;
                    }
                    Err(err) => warn!("processing task panicked: {err}"),
                }
            });
        }
        drop(tx);

        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            stats.record(&result);
            on_result(&result);
            results.push(result);
        }
        stats.finish();

        Ok((results, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Operation;
    use crate::pipeline::testutil::FakeBackend;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::time::Duration;

    fn entries(count: usize) -> Vec<RepoEntry> {
        (0..count)
            .map(|i| RepoEntry {
                path: PathBuf::from(format!("/repos/repo{i}")),
                name: format!("repo{i}"),
                has_git: true,
            })
            .collect()
    }

    fn orchestrator(workers: usize, backend: Arc<FakeBackend>) -> Orchestrator {
        let config = Arc::new(Config {
            operation: Operation::Scan,
            workers,
            ..Config::default()
        });
        let processor = Arc::new(RepoProcessor::new(config.clone(), backend));
        Orchestrator::new(config, processor)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_every_entry_produces_exactly_one_result() {
        let backend = Arc::new(FakeBackend::clean());
        let orchestrator = orchestrator(3, backend);
        let cancel = CancellationToken::new();

        let (results, stats) = orchestrator.run(&cancel, entries(10), |_| {}).await.unwrap();

        assert_eq!(results.len(), 10);
        let distinct: HashSet<_> = results.iter().map(|r| r.repo.path.clone()).collect();
        assert_eq!(distinct.len(), 10);
        assert_eq!(stats.total, 10);
        assert_eq!(stats.total, stats.successful + stats.failed + stats.skipped);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failures_are_isolated() {
        let backend = Arc::new(FakeBackend::clean().failing_for("/repos/repo3"));
        let orchestrator = orchestrator(2, backend);
        let cancel = CancellationToken::new();

        let (results, stats) = orchestrator.run(&cancel, entries(6), |_| {}).await.unwrap();

        assert_eq!(results.len(), 6);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.successful, 5);
        assert_eq!(stats.total, stats.successful + stats.failed + stats.skipped);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrency_never_exceeds_limit() {
        let backend = Arc::new(FakeBackend::clean().with_status_delay(Duration::from_millis(30)));
        let orchestrator = orchestrator(2, backend.clone());
        let cancel = CancellationToken::new();

        let (results, _) = orchestrator.run(&cancel, entries(10), |_| {}).await.unwrap();

        assert_eq!(results.len(), 10);
        assert!(
            backend.max_in_flight() <= 2,
            "observed {} concurrent pipelines",
            backend.max_in_flight()
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancellation_stops_new_work() {
        let backend = Arc::new(FakeBackend::clean().gated());
        let orchestrator = orchestrator(5, backend.clone());
        let cancel = CancellationToken::new();

        let run = orchestrator.run(&cancel, entries(10), |_| {});
        tokio::pin!(run);

        // let the first five reach the gate, then cancel and release them
        let outcome = tokio::select! {
            outcome = &mut run => Some(outcome),
            () = async {
                while backend.in_flight() < 5 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                cancel.cancel();
                backend.open_gate();
            } => None,
        };
        let outcome = match outcome {
            Some(outcome) => outcome,
            None => run.await,
        };

        let (results, stats) = outcome.unwrap();
        assert_eq!(results.len(), 5, "queued entries must never start");
        assert_eq!(stats.total, 5);
    }

    #[tokio::test]
    async fn test_already_cancelled_submission_fails() {
        let backend = Arc::new(FakeBackend::clean());
        let orchestrator = orchestrator(2, backend);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orchestrator.run(&cancel, entries(3), |_| {}).await.unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn test_empty_entry_list() {
        let backend = Arc::new(FakeBackend::clean());
        let orchestrator = orchestrator(2, backend);
        let cancel = CancellationToken::new();

        let (results, stats) = orchestrator.run(&cancel, Vec::new(), |_| {}).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(stats.total, 0);
        assert!(stats.finished_at.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_results_arrive_in_completion_order() {
        let backend = Arc::new(FakeBackend::clean());
        let orchestrator = orchestrator(4, backend);
        let cancel = CancellationToken::new();

        let mut streamed = Vec::new();
        let (results, _) = orchestrator
            .run(&cancel, entries(8), |r| streamed.push(r.repo.name.clone()))
            .await
            .unwrap();

        // the callback sees the same sequence the aggregate list records,
        // whatever order completions happened to land in
        let collected: Vec<String> = results.iter().map(|r| r.repo.name.clone()).collect();
        assert_eq!(streamed, collected);
    }
}
