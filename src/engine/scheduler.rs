//! Bounded-concurrency fan-out of probe tasks with cooperative cancellation
//! and rate-limited progress reporting

use crate::engine::geo::GeoClassifier;
use crate::engine::latency::LatencyProbe;
use crate::engine::models::{ProbeOutcome, ProbeTask, ProtocolKind};
use crate::engine::probe::{ProtocolProbe, DEFAULT_ECHO_URL};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Default number of concurrent probes. Unbounded fan-out against arbitrary
/// hosts exhausts sockets, so the ceiling is always enforced.
const DEFAULT_CONCURRENCY: usize = 50;

/// Default per-probe timeout in seconds
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Minimum wall-clock gap between progress reports. Downstream progress
/// surfaces reject overly frequent updates; the scheduler absorbs that
/// constraint instead of pushing it onto the caller.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Progress callback. May fail (a rejected surface update); failures are
/// swallowed and the batch continues.
pub type ProgressSink = Arc<dyn Fn(usize, usize) -> anyhow::Result<()> + Send + Sync>;

/// Configuration for one validation batch
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Protocols each candidate is probed under
    pub protocols: Vec<ProtocolKind>,
    /// Concurrency ceiling for in-flight probes
    pub concurrency: usize,
    /// Timeout applied to every network operation of a single probe
    pub probe_timeout: Duration,
    /// Echo endpoint the protocol probe requests through the proxy
    pub echo_url: String,
    /// Classify successes into protocol+country buckets as well
    pub enable_country: bool,
    /// Honor the cancel signal at task-start boundaries
    pub enable_cancellation: bool,
    /// Path to a GeoLite2 country database, optional
    pub mmdb_path: Option<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            protocols: ProtocolKind::default_set(),
            concurrency: DEFAULT_CONCURRENCY,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            echo_url: DEFAULT_ECHO_URL.to_string(),
            enable_country: false,
            enable_cancellation: true,
            mmdb_path: None,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_protocols(mut self, protocols: Vec<ProtocolKind>) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_echo_url(mut self, url: String) -> Self {
        self.echo_url = url;
        self
    }

    pub fn with_country_classification(mut self, enabled: bool) -> Self {
        self.enable_country = enabled;
        self
    }

    pub fn with_cancellation(mut self, enabled: bool) -> Self {
        self.enable_cancellation = enabled;
        self
    }

    pub fn with_mmdb_path(mut self, path: String) -> Self {
        self.mmdb_path = Some(path);
        self
    }
}

/// Shared stop request, settable once per batch from outside the scheduler.
///
/// Cancellation is cooperative: workers check the flag before starting a
/// task; probes already in flight are allowed to finish and their outcomes
/// are still recorded.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Wall-clock throttle for progress reports.
///
/// Never emits at `processed == total`: the completion report is forced by
/// the scheduler after the fan-out drains, so it fires exactly once.
pub(crate) struct ProgressGate {
    interval: Duration,
    start: Instant,
    last_ms: AtomicU64,
}

impl ProgressGate {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            start: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    pub(crate) fn should_emit(&self, processed: usize, total: usize) -> bool {
        if total == 0 || processed >= total {
            return false;
        }
        let now_ms = self.start.elapsed().as_millis() as u64;
        let last = self.last_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) < self.interval.as_millis() as u64 {
            return false;
        }
        // Only one racing worker wins the slot
        self.last_ms
            .compare_exchange(last, now_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }
}

/// Fans probe tasks out with bounded concurrency and collects outcomes in
/// completion order.
pub struct ValidationScheduler {
    config: BatchConfig,
    latency: LatencyProbe,
    probe: ProtocolProbe,
    geo: GeoClassifier,
}

impl ValidationScheduler {
    pub fn with_config(config: BatchConfig) -> Self {
        let geo = match (config.enable_country, &config.mmdb_path) {
            (true, Some(path)) => GeoClassifier::open(path),
            _ => GeoClassifier::disabled(),
        };
        let latency = LatencyProbe::new(config.probe_timeout);
        let probe = ProtocolProbe::new(config.probe_timeout, config.echo_url.clone());
        Self {
            config,
            latency,
            probe,
            geo,
        }
    }

    /// Execute the task set. Outcomes arrive in completion order; tasks
    /// skipped by cancellation produce no outcome and do not advance the
    /// processed counter.
    pub async fn run(
        &self,
        tasks: Vec<ProbeTask>,
        progress: Option<ProgressSink>,
        cancel: CancelSignal,
    ) -> Vec<ProbeOutcome> {
        let total = tasks.len();
        let concurrency = self.config.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let processed = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(ProgressGate::new(PROGRESS_INTERVAL));

        let outcomes: Vec<Option<ProbeOutcome>> = stream::iter(tasks)
            .map(|task| {
                let sem = Arc::clone(&semaphore);
                let processed = Arc::clone(&processed);
                let gate = Arc::clone(&gate);
                let progress = progress.clone();
                let cancel = cancel.clone();
                let scheduler = self.clone();
                async move {
                    // Semaphore acquire only fails if the semaphore is closed,
                    // which won't happen here since we own the Arc and keep it
                    // alive for the duration of the batch.
                    let _permit = sem
                        .acquire()
                        .await
                        .expect("Semaphore closed unexpectedly");

                    if scheduler.config.enable_cancellation && cancel.is_triggered() {
                        // Drained without executing any network call
                        return None;
                    }

                    let outcome = scheduler.probe_task(task).await;
                    let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(sink) = &progress {
                        if gate.should_emit(done, total) {
                            Self::emit(sink, done, total);
                        }
                    }
                    Some(outcome)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        // Completion report, exactly once. With cancellation triggered this
        // reports the final partial count instead.
        if total > 0 {
            if let Some(sink) = &progress {
                Self::emit(sink, processed.load(Ordering::SeqCst), total);
            }
        }

        outcomes.into_iter().flatten().collect()
    }

    /// Probe one task: latency and protocol verification run concurrently,
    /// each under its own timeout, so a stuck probe always frees its slot.
    async fn probe_task(&self, task: ProbeTask) -> ProbeOutcome {
        let ProbeTask {
            candidate,
            protocol,
        } = task;

        let (latency_ms, verified) = tokio::join!(
            self.latency.measure(&candidate),
            self.probe.verify(&candidate, protocol)
        );

        if verified {
            let country = self
                .config
                .enable_country
                .then(|| self.geo.classify(&candidate.host));
            ProbeOutcome::verified(candidate, protocol, latency_ms, country)
        } else {
            ProbeOutcome::failed(candidate, protocol, latency_ms)
        }
    }

    fn emit(sink: &ProgressSink, processed: usize, total: usize) {
        if let Err(e) = sink(processed, total) {
            // Progress is best-effort; a rejected update never aborts the run
            log::debug!("progress sink rejected update: {}", e);
        }
    }
}

impl Clone for ValidationScheduler {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            latency: self.latency.clone(),
            probe: self.probe.clone(),
            geo: self.geo.clone(),
        }
    }
}
