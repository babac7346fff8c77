//! Randomness sources for the collect-randomness round
//!
//! Agents agree on a shared randomness value each period; the production
//! source is a drand-style HTTP beacon, with a deterministic local source
//! for simulations and tests.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::config::BeaconConfig;

/// Errors from fetching beacon randomness.
#[derive(Debug, thiserror::Error)]
pub enum BeaconError {
    #[error("beacon request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("beacon gave up after {0} retries")]
    RetriesExceeded(u32),
}

/// Source of the per-period shared randomness.
#[async_trait]
pub trait RandomnessSource: Send + Sync {
    /// Fetch the randomness for the given period.
    async fn fetch(&self, period: u64) -> Result<String, BeaconError>;
}

#[derive(Debug, Deserialize)]
struct DrandRound {
    round: u64,
    randomness: String,
}

/// HTTP client for a drand-style beacon (`GET {url}/public/latest`).
pub struct DrandBeacon {
    http: reqwest::Client,
    url: String,
    max_retries: u32,
}

impl DrandBeacon {
    pub fn new(config: &BeaconConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        }
    }
}

#[async_trait]
impl RandomnessSource for DrandBeacon {
    async fn fetch(&self, _period: u64) -> Result<String, BeaconError> {
        let endpoint = format!("{}/public/latest", self.url);
        let mut attempts = 0;
        loop {
            match self.http.get(&endpoint).send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => {
                        let observed: DrandRound = response.json().await?;
                        tracing::debug!(round = observed.round, "Fetched beacon randomness");
                        return Ok(observed.randomness);
                    }
                    Err(e) => {
                        attempts += 1;
                        warn!(attempts, "Beacon returned error status: {e}");
                    }
                },
                Err(e) => {
                    attempts += 1;
                    warn!(attempts, "Beacon unreachable: {e}");
                }
            }
            if attempts >= self.max_retries {
                return Err(BeaconError::RetriesExceeded(attempts));
            }
        }
    }
}

/// Deterministic source for local simulation: randomness is derived from a
/// fixed seed and the period count, so every simulated agent agrees.
pub struct LocalRandomness {
    seed: String,
}

impl LocalRandomness {
    pub fn new(seed: impl Into<String>) -> Self {
        Self { seed: seed.into() }
    }
}

#[async_trait]
impl RandomnessSource for LocalRandomness {
    async fn fetch(&self, period: u64) -> Result<String, BeaconError> {
        Ok(format!("{}-{period}", self.seed))
    }
}
