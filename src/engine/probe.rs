//! Protocol verification by requesting an echo endpoint through the proxy

use crate::engine::models::{Candidate, ProtocolKind};
use crate::Result;
use reqwest::{Client, Proxy, StatusCode};
use std::time::Duration;
use tokio::time;

/// Echo endpoint used to confirm a proxy actually forwards traffic
pub const DEFAULT_ECHO_URL: &str = "https://api.ipify.org";

/// Verifies that a candidate forwards real requests under a given protocol.
#[derive(Debug, Clone)]
pub struct ProtocolProbe {
    timeout: Duration,
    echo_url: String,
}

impl ProtocolProbe {
    pub fn new(timeout: Duration, echo_url: String) -> Self {
        Self { timeout, echo_url }
    }

    /// Issue one request through the candidate configured as `protocol`.
    ///
    /// Success means the echo endpoint answered 200 within the timeout.
    /// Every other outcome is failure; failures are indistinct and are not
    /// logged, since the vast majority of candidates are expected to fail.
    pub async fn verify(&self, candidate: &Candidate, protocol: ProtocolKind) -> bool {
        let client = match self.build_client(candidate, protocol) {
            Ok(client) => client,
            Err(_) => return false,
        };

        match time::timeout(self.timeout, client.get(&self.echo_url).send()).await {
            Ok(Ok(response)) => response.status() == StatusCode::OK,
            _ => false,
        }
    }

    /// Proxy URL for the candidate under the given protocol
    pub fn proxy_url(candidate: &Candidate, protocol: ProtocolKind) -> String {
        format!(
            "{}://{}:{}",
            protocol.scheme(),
            candidate.host,
            candidate.port
        )
    }

    /// Build a fresh client routed through the candidate. No connection
    /// reuse across probes; every probe is self-contained.
    fn build_client(&self, candidate: &Candidate, protocol: ProtocolKind) -> Result<Client> {
        let proxy = Proxy::all(Self::proxy_url(candidate, protocol))?;
        let client = Client::builder()
            .proxy(proxy)
            .timeout(self.timeout)
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(client)
    }
}
