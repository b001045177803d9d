//! Aggregation of probe outcomes into categorized result buckets

use crate::engine::geo::UNKNOWN_COUNTRY;
use crate::engine::models::ProbeOutcome;
use std::collections::HashMap;

/// Collects verified candidates into buckets keyed by protocol and,
/// optionally, by protocol + country.
///
/// Holds no cross-batch state: one aggregator is created per batch and
/// consumed when the batch finishes, so results can never leak between runs.
pub struct ResultAggregator {
    buckets: HashMap<String, Vec<String>>,
    country_buckets: bool,
    successes: usize,
}

impl ResultAggregator {
    pub fn new(country_buckets: bool) -> Self {
        Self {
            buckets: HashMap::new(),
            country_buckets,
            successes: 0,
        }
    }

    /// Record one outcome. Failures are ignored; a success appends the
    /// candidate's `host:port` string to its protocol bucket and, when
    /// country classification is on, to the `protocol_country` bucket.
    /// Buckets are created lazily, entries keep completion order.
    pub fn record(&mut self, outcome: &ProbeOutcome) {
        if !outcome.success {
            return;
        }
        self.successes += 1;

        let endpoint = outcome.candidate.endpoint();
        let protocol = outcome.protocol.label().to_string();
        self.buckets
            .entry(protocol.clone())
            .or_default()
            .push(endpoint.clone());

        if self.country_buckets {
            let country = outcome.country.as_deref().unwrap_or(UNKNOWN_COUNTRY);
            self.buckets
                .entry(format!("{}_{}", protocol, country))
                .or_default()
                .push(endpoint);
        }
    }

    /// Record a whole sequence of outcomes in order
    pub fn record_all<'a, I>(&mut self, outcomes: I)
    where
        I: IntoIterator<Item = &'a ProbeOutcome>,
    {
        for outcome in outcomes {
            self.record(outcome);
        }
    }

    /// Number of successful outcomes recorded. Country buckets mirror
    /// protocol buckets, so this is tracked directly rather than derived
    /// from bucket keys.
    pub fn success_count(&self) -> usize {
        self.successes
    }

    /// Consume the aggregator and hand the buckets to the caller
    pub fn into_buckets(self) -> HashMap<String, Vec<String>> {
        self.buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::{Candidate, ProbeOutcome, ProtocolKind};

    fn candidate(endpoint: &str) -> Candidate {
        let (host, port) = endpoint.split_once(':').unwrap();
        Candidate::new(host.to_string(), port.parse().unwrap())
    }

    #[test]
    fn test_failures_bucket_nowhere() {
        // Raw connectivity without protocol verification must not qualify
        let mut agg = ResultAggregator::new(true);
        agg.record(&ProbeOutcome::failed(
            candidate("1.2.3.4:8080"),
            ProtocolKind::Http,
            Some(42.0),
        ));
        assert!(agg.into_buckets().is_empty());
    }

    #[test]
    fn test_success_goes_to_protocol_bucket() {
        let mut agg = ResultAggregator::new(false);
        agg.record(&ProbeOutcome::verified(
            candidate("1.2.3.4:8080"),
            ProtocolKind::Http,
            Some(10.0),
            None,
        ));
        let buckets = agg.into_buckets();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets["http"], vec!["1.2.3.4:8080"]);
    }

    #[test]
    fn test_country_bucket_with_unknown() {
        // Geo database absent: the success still lands in http and http_unknown
        let mut agg = ResultAggregator::new(true);
        agg.record(&ProbeOutcome::verified(
            candidate("198.51.100.7:3128"),
            ProtocolKind::Http,
            Some(10.0),
            Some("unknown".to_string()),
        ));
        let buckets = agg.into_buckets();
        assert_eq!(buckets["http"], vec!["198.51.100.7:3128"]);
        assert_eq!(buckets["http_unknown"], vec!["198.51.100.7:3128"]);
    }

    #[test]
    fn test_multi_protocol_membership() {
        // One entry per protocol the candidate verified under
        let mut agg = ResultAggregator::new(true);
        let c = candidate("1.2.3.4:1080");
        agg.record(&ProbeOutcome::verified(
            c.clone(),
            ProtocolKind::Http,
            None,
            Some("germany".to_string()),
        ));
        agg.record(&ProbeOutcome::verified(
            c,
            ProtocolKind::Socks5,
            None,
            Some("germany".to_string()),
        ));
        let buckets = agg.into_buckets();
        assert_eq!(buckets["http"], vec!["1.2.3.4:1080"]);
        assert_eq!(buckets["socks5"], vec!["1.2.3.4:1080"]);
        assert_eq!(buckets["http_germany"], vec!["1.2.3.4:1080"]);
        assert_eq!(buckets["socks5_germany"], vec!["1.2.3.4:1080"]);
    }

    #[test]
    fn test_entries_keep_completion_order() {
        let mut agg = ResultAggregator::new(false);
        for endpoint in ["5.5.5.5:80", "1.1.1.1:80", "9.9.9.9:80"] {
            agg.record(&ProbeOutcome::verified(
                candidate(endpoint),
                ProtocolKind::Socks4,
                None,
                None,
            ));
        }
        let buckets = agg.into_buckets();
        assert_eq!(
            buckets["socks4"],
            vec!["5.5.5.5:80", "1.1.1.1:80", "9.9.9.9:80"]
        );
    }

    #[test]
    fn test_batches_are_isolated() {
        let mut first = ResultAggregator::new(false);
        first.record(&ProbeOutcome::verified(
            candidate("1.2.3.4:8080"),
            ProtocolKind::Http,
            None,
            None,
        ));
        let first_buckets = first.into_buckets();

        let second = ResultAggregator::new(false);
        let second_buckets = second.into_buckets();

        assert_eq!(first_buckets["http"].len(), 1);
        assert!(second_buckets.is_empty());
    }

    #[test]
    fn test_success_count_ignores_country_mirrors() {
        let mut agg = ResultAggregator::new(true);
        agg.record(&ProbeOutcome::verified(
            candidate("1.2.3.4:8080"),
            ProtocolKind::Http,
            None,
            Some("france".to_string()),
        ));
        assert_eq!(agg.success_count(), 1);
    }

    #[test]
    fn test_success_count_independent_of_key_shape() {
        // The count must not be derived from bucket key syntax, even for
        // country values that themselves contain the key separator
        let mut agg = ResultAggregator::new(true);
        agg.record(&ProbeOutcome::verified(
            candidate("1.2.3.4:8080"),
            ProtocolKind::Http,
            None,
            Some("new_zealand".to_string()),
        ));
        agg.record(&ProbeOutcome::failed(
            candidate("5.6.7.8:8080"),
            ProtocolKind::Http,
            None,
        ));
        assert_eq!(agg.success_count(), 1);
        assert_eq!(agg.into_buckets()["http_new_zealand"].len(), 1);
    }
}
