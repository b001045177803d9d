//! Remote proxy-list fetching
//!
//! Downloads raw candidate lists from HTTP sources. Fetching only produces
//! lines; normalization and dedupe stay with the endpoint parser.

use crate::Result;
use reqwest::Client;
use std::time::Duration;

/// Default timeout for list downloads in seconds
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default user agent for list downloads
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// A named remote list source
#[derive(Debug, Clone)]
pub struct ListSource {
    pub name: String,
    pub url: String,
}

impl ListSource {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Result of fetching a single source
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The source that was fetched
    pub source: String,
    /// Raw non-blank lines from the response body
    pub lines: Vec<String>,
    /// Error message if the fetch failed
    pub error: Option<String>,
}

impl FetchResult {
    pub fn success(source: String, lines: Vec<String>) -> Self {
        Self {
            source,
            lines,
            error: None,
        }
    }

    pub fn failure(source: String, error: String) -> Self {
        Self {
            source,
            lines: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Configuration for the list fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Timeout for each download
    pub timeout: Duration,
    /// User agent sent with requests
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Fetcher for remote proxy lists
pub struct ListFetcher {
    client: Client,
}

impl ListFetcher {
    /// Create a fetcher with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(FetcherConfig::default())
    }

    /// Create a fetcher with custom configuration
    pub fn with_config(config: FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Download one list and return its non-blank lines.
    /// Non-success statuses are errors; an empty body is a valid empty list.
    pub async fn fetch_url(&self, url: &str) -> Result<Vec<String>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let content = response.text().await?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Fetch several sources, returning a per-source result so one dead
    /// source does not sink the others.
    pub async fn fetch_sources_with_results(&self, sources: &[ListSource]) -> Vec<FetchResult> {
        let mut results = Vec::new();
        for source in sources {
            let result = match self.fetch_url(&source.url).await {
                Ok(lines) => FetchResult::success(source.name.clone(), lines),
                Err(e) => FetchResult::failure(source.name.clone(), e.to_string()),
            };
            results.push(result);
        }
        results
    }

    /// Well-known free list sources, one per probe protocol
    pub fn default_sources() -> Vec<ListSource> {
        vec![
            ListSource::new(
                "proxyscrape-http",
                "https://api.proxyscrape.com/v2/?request=getproxies&protocol=http&timeout=10000&country=all",
            ),
            ListSource::new(
                "proxyscrape-socks4",
                "https://api.proxyscrape.com/v2/?request=getproxies&protocol=socks4&timeout=10000&country=all",
            ),
            ListSource::new(
                "proxyscrape-socks5",
                "https://api.proxyscrape.com/v2/?request=getproxies&protocol=socks5&timeout=10000&country=all",
            ),
        ]
    }
}
