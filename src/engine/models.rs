//! Data model for a validation batch

use serde::{Deserialize, Serialize};
use std::fmt;

/// Proxy protocol enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProtocolKind {
    #[default]
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProtocolKind {
    /// Lowercase label used as a bucket key
    pub fn label(&self) -> &'static str {
        match self {
            ProtocolKind::Http => "http",
            ProtocolKind::Https => "https",
            ProtocolKind::Socks4 => "socks4",
            ProtocolKind::Socks5 => "socks5",
        }
    }

    /// URL scheme used when configuring a probe client.
    ///
    /// HTTPS proxies speak the same CONNECT dialect as HTTP ones, so they
    /// share the `http` scheme and are never probed separately.
    pub fn scheme(&self) -> &'static str {
        match self {
            ProtocolKind::Http | ProtocolKind::Https => "http",
            ProtocolKind::Socks4 => "socks4",
            ProtocolKind::Socks5 => "socks5",
        }
    }

    /// The protocol actually probed for this kind (HTTPS collapses to HTTP).
    pub fn probe_equivalent(&self) -> ProtocolKind {
        match self {
            ProtocolKind::Https => ProtocolKind::Http,
            other => *other,
        }
    }

    /// Default protocol set for a batch. HTTPS is excluded as redundant.
    pub fn default_set() -> Vec<ProtocolKind> {
        vec![
            ProtocolKind::Http,
            ProtocolKind::Socks4,
            ProtocolKind::Socks5,
        ]
    }

    /// Collapse a configured protocol set to the set actually probed:
    /// HTTPS maps to HTTP and duplicates are removed, first-seen order kept.
    pub fn normalize_set(protocols: &[ProtocolKind]) -> Vec<ProtocolKind> {
        let mut out = Vec::new();
        for p in protocols {
            let p = p.probe_equivalent();
            if !out.contains(&p) {
                out.push(p);
            }
        }
        out
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A parsed host:port pair awaiting validation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub host: String,
    pub port: u16,
}

impl Candidate {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    /// The original `host:port` form, used for dedupe keys and bucket entries
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Unit of work: one candidate probed under one protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTask {
    pub candidate: Candidate,
    pub protocol: ProtocolKind,
}

/// Cartesian product of candidates and the normalized protocol set.
///
/// Candidates are already deduplicated by the parser, so no
/// (candidate, protocol) pair appears twice.
pub fn expand_tasks(candidates: &[Candidate], protocols: &[ProtocolKind]) -> Vec<ProbeTask> {
    let protocols = ProtocolKind::normalize_set(protocols);
    let mut tasks = Vec::with_capacity(candidates.len() * protocols.len());
    for candidate in candidates {
        for &protocol in &protocols {
            tasks.push(ProbeTask {
                candidate: candidate.clone(),
                protocol,
            });
        }
    }
    tasks
}

/// Result of one probe task, produced exactly once, never retried
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub candidate: Candidate,
    pub protocol: ProtocolKind,
    pub success: bool,
    /// Raw TCP connect time in milliseconds, independent of protocol success
    pub latency_ms: Option<f64>,
    /// Lowercased country name, `"unknown"` when undetermined
    pub country: Option<String>,
}

impl ProbeOutcome {
    pub fn verified(
        candidate: Candidate,
        protocol: ProtocolKind,
        latency_ms: Option<f64>,
        country: Option<String>,
    ) -> Self {
        Self {
            candidate,
            protocol,
            success: true,
            latency_ms,
            country,
        }
    }

    pub fn failed(candidate: Candidate, protocol: ProtocolKind, latency_ms: Option<f64>) -> Self {
        Self {
            candidate,
            protocol,
            success: false,
            latency_ms,
            country: None,
        }
    }
}

/// Counters returned to the caller alongside the buckets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_candidates: usize,
    pub total_probes_run: usize,
    pub total_successes: usize,
    pub skipped_lines: usize,
}
