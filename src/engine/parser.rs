//! Endpoint parser for raw proxy list lines

use crate::engine::models::Candidate;
use std::collections::HashSet;

/// Outcome of parsing one batch of raw lines
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    /// Valid candidates, deduplicated, first-seen order
    pub candidates: Vec<Candidate>,
    /// Count of malformed non-blank lines that were dropped
    pub skipped: usize,
}

/// Parser that normalizes raw `host:port` lines into candidates
pub struct EndpointParser;

impl EndpointParser {
    /// Parse a single line.
    ///
    /// Accepts `host:port` with any number of trailing colon-separated
    /// fields, which are ignored. The port must be an integer in
    /// [1, 65535]. Returns `None` for anything else.
    pub fn parse_line(line: &str) -> Option<Candidate> {
        let line = line.trim();
        let mut parts = line.split(':');
        let host = parts.next()?;
        let port = parts.next()?;
        if host.is_empty() {
            return None;
        }
        let port: u16 = port.trim().parse().ok()?;
        if port == 0 {
            return None;
        }
        Some(Candidate::new(host.to_string(), port))
    }

    /// Parse a batch of raw lines.
    ///
    /// Blank lines are skipped silently; malformed lines are dropped and
    /// counted. Candidates are deduplicated on the exact `host:port` string,
    /// preserving first-seen order.
    pub fn parse<'a, I>(lines: I) -> ParseReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut report = ParseReport::default();
        let mut seen = HashSet::new();

        for line in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match Self::parse_line(trimmed) {
                Some(candidate) => {
                    if seen.insert(candidate.endpoint()) {
                        report.candidates.push(candidate);
                    }
                }
                None => report.skipped += 1,
            }
        }

        report
    }

    /// Parse the contents of a proxy list file
    pub fn parse_str(content: &str) -> ParseReport {
        Self::parse(content.lines())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_line() {
        let c = EndpointParser::parse_line("192.168.1.1:8080").unwrap();
        assert_eq!(c.host, "192.168.1.1");
        assert_eq!(c.port, 8080);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let c = EndpointParser::parse_line("  10.0.0.1:3128  ").unwrap();
        assert_eq!(c.endpoint(), "10.0.0.1:3128");
    }

    #[test]
    fn test_parse_ignores_trailing_fields() {
        // user:pass suffixes are discarded, not an error
        let c = EndpointParser::parse_line("10.0.0.1:1080:user:pass").unwrap();
        assert_eq!(c.endpoint(), "10.0.0.1:1080");
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(EndpointParser::parse_line("").is_none());
        assert!(EndpointParser::parse_line("no-colon-here").is_none());
        assert!(EndpointParser::parse_line("1.2.3.4:").is_none());
        assert!(EndpointParser::parse_line(":8080").is_none());
        assert!(EndpointParser::parse_line("1.2.3.4:abc").is_none());
        assert!(EndpointParser::parse_line("1.2.3.4:0").is_none());
        assert!(EndpointParser::parse_line("1.2.3.4:65536").is_none());
        assert!(EndpointParser::parse_line("1.2.3.4:-1").is_none());
    }

    #[test]
    fn test_parse_port_bounds() {
        assert_eq!(EndpointParser::parse_line("h:1").unwrap().port, 1);
        assert_eq!(EndpointParser::parse_line("h:65535").unwrap().port, 65535);
    }

    #[test]
    fn test_parse_batch_skip_accounting() {
        let report = EndpointParser::parse(vec![
            "203.0.113.5:8080",
            "",
            "   ",
            "bad-line",
            "198.51.100.7:3128",
        ]);
        assert_eq!(report.candidates.len(), 2);
        // blank lines are not counted as skipped, malformed ones are
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_parse_dedupes_preserving_order() {
        let report = EndpointParser::parse(vec![
            "1.2.3.4:8080",
            "5.6.7.8:1080",
            "1.2.3.4:8080",
            "1.2.3.4:8080",
        ]);
        let endpoints: Vec<String> = report.candidates.iter().map(|c| c.endpoint()).collect();
        assert_eq!(endpoints, vec!["1.2.3.4:8080", "5.6.7.8:1080"]);
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn test_parse_scenario_duplicate_and_bad_line() {
        let report =
            EndpointParser::parse(vec!["203.0.113.5:8080", "bad-line", "203.0.113.5:8080"]);
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_parse_str() {
        let report = EndpointParser::parse_str("1.2.3.4:80\nrubbish\n5.6.7.8:443\n");
        assert_eq!(report.candidates.len(), 2);
        assert_eq!(report.skipped, 1);
    }
}
