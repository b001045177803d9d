//! Concurrent proxy validation engine
//!
//! This module provides functionality for:
//! - Fetching candidate lists from remote HTTP sources
//! - Parsing raw `host:port` lines into deduplicated candidates
//! - Probing each candidate under one or more proxy protocols with bounded
//!   concurrency, cooperative cancellation, and throttled progress reports
//! - Classifying verified proxies by protocol and, optionally, country
//! - Aggregating successes into exportable buckets

pub mod aggregator;
pub mod fetcher;
pub mod geo;
pub mod latency;
pub mod models;
pub mod parser;
pub mod probe;
pub mod scheduler;

pub use aggregator::ResultAggregator;
pub use fetcher::{FetchResult, FetcherConfig, ListFetcher, ListSource};
pub use geo::{GeoClassifier, UNKNOWN_COUNTRY};
pub use latency::LatencyProbe;
pub use models::{
    expand_tasks, BatchSummary, Candidate, ProbeOutcome, ProbeTask, ProtocolKind,
};
pub use parser::{EndpointParser, ParseReport};
pub use probe::{ProtocolProbe, DEFAULT_ECHO_URL};
pub use scheduler::{BatchConfig, CancelSignal, ProgressSink, ValidationScheduler};

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Conditions under which a batch cannot even start.
///
/// These are distinct from an all-failures batch: the caller can tell
/// "nothing to do" apart from "everything was probed and nothing worked".
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no protocols configured for the batch")]
    NoProtocols,
    #[error("no valid candidates in input ({skipped} malformed lines skipped)")]
    NoCandidates { skipped: usize },
}

/// Final result of one batch: categorized buckets plus counters
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Bucket key (`protocol` or `protocol_country`) to verified endpoints,
    /// in completion order
    pub buckets: HashMap<String, Vec<String>>,
    pub summary: BatchSummary,
}

/// Validate one batch of raw proxy lines end to end.
///
/// Parses and dedupes the lines, expands the candidate x protocol task set,
/// schedules the probes, and aggregates verified candidates into buckets.
/// Returns [`EngineError`] when there is nothing to do; partial batches
/// (cancellation, universal failure) are `Ok` with whatever was produced.
pub async fn run_batch(
    lines: &[String],
    config: &BatchConfig,
    progress: Option<ProgressSink>,
    cancel: CancelSignal,
) -> Result<BatchReport, EngineError> {
    let protocols = ProtocolKind::normalize_set(&config.protocols);
    if protocols.is_empty() {
        return Err(EngineError::NoProtocols);
    }

    let report = EndpointParser::parse(lines.iter().map(String::as_str));
    if report.candidates.is_empty() {
        return Err(EngineError::NoCandidates {
            skipped: report.skipped,
        });
    }

    let tasks = expand_tasks(&report.candidates, &protocols);
    log::info!(
        "batch start: {} candidates, {} probes, {} lines skipped",
        report.candidates.len(),
        tasks.len(),
        report.skipped
    );

    let scheduler = ValidationScheduler::with_config(config.clone());
    let outcomes = scheduler.run(tasks, progress, cancel).await;

    let mut aggregator = ResultAggregator::new(config.enable_country);
    aggregator.record_all(&outcomes);

    let summary = BatchSummary {
        total_candidates: report.candidates.len(),
        total_probes_run: outcomes.len(),
        total_successes: aggregator.success_count(),
        skipped_lines: report.skipped,
    };
    log::info!(
        "batch done: {} probes run, {} working",
        summary.total_probes_run,
        summary.total_successes
    );

    Ok(BatchReport {
        buckets: aggregator.into_buckets(),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn local_config() -> BatchConfig {
        BatchConfig::new()
            .with_protocols(vec![ProtocolKind::Http])
            .with_probe_timeout(Duration::from_millis(300))
            .with_concurrency(4)
    }

    #[tokio::test]
    async fn test_no_protocols_is_distinct_error() {
        let config = local_config().with_protocols(vec![]);
        let err = run_batch(
            &lines(&["1.2.3.4:8080"]),
            &config,
            None,
            CancelSignal::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::NoProtocols));
    }

    #[tokio::test]
    async fn test_no_candidates_reports_skipped_count() {
        let err = run_batch(
            &lines(&["garbage", "", "also-bad"]),
            &local_config(),
            None,
            CancelSignal::new(),
        )
        .await
        .unwrap_err();
        match err {
            EngineError::NoCandidates { skipped } => assert_eq!(skipped, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_failed_batch_returns_empty_buckets_with_summary() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let input = lines(&[
            &format!("127.0.0.1:{port}"),
            "bad-line",
            &format!("127.0.0.1:{port}"),
        ]);
        let report = run_batch(&input, &local_config(), None, CancelSignal::new())
            .await
            .unwrap();

        // Duplicate line collapses to one candidate, one probe
        assert_eq!(report.summary.total_candidates, 1);
        assert_eq!(report.summary.total_probes_run, 1);
        assert_eq!(report.summary.total_successes, 0);
        assert_eq!(report.summary.skipped_lines, 1);
        assert!(report.buckets.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_batch_yields_empty_buckets() {
        let input = lines(&["127.0.0.1:1", "127.0.0.1:2", "127.0.0.1:3"]);
        let cancel = CancelSignal::new();
        cancel.trigger();

        let report = run_batch(&input, &local_config(), None, cancel)
            .await
            .unwrap();
        assert_eq!(report.summary.total_probes_run, 0);
        assert!(report.buckets.is_empty());
    }

    #[tokio::test]
    async fn test_sequential_batches_do_not_leak() {
        let cancel_all = || {
            let c = CancelSignal::new();
            c.trigger();
            c
        };
        // Cancelled batches keep the run fast; isolation is what matters here
        let first = run_batch(&lines(&["10.0.0.1:80"]), &local_config(), None, cancel_all())
            .await
            .unwrap();
        let second = run_batch(&lines(&["10.0.0.2:81"]), &local_config(), None, cancel_all())
            .await
            .unwrap();
        assert!(first.buckets.is_empty());
        assert!(second.buckets.is_empty());
        assert_eq!(second.summary.total_candidates, 1);
    }
}
