//! Raw TCP connect latency measurement

use crate::engine::models::Candidate;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time;

/// Measures raw connect time to a candidate, independent of whether the
/// candidate is actually a working proxy.
#[derive(Debug, Clone)]
pub struct LatencyProbe {
    timeout: Duration,
}

impl LatencyProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Connect to `host:port` and return elapsed milliseconds rounded to two
    /// decimals, or `None` on refusal, timeout, or resolution failure.
    pub async fn measure(&self, candidate: &Candidate) -> Option<f64> {
        let addr = candidate.endpoint();
        let start = Instant::now();
        match time::timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(_stream)) => {
                let millis = start.elapsed().as_secs_f64() * 1000.0;
                Some((millis * 100.0).round() / 100.0)
            }
            _ => None,
        }
    }
}
