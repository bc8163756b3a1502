//! Ingestion configuration
//!
//! All knobs the pipeline consumes: source endpoint, target directories,
//! fetch concurrency, retry/backoff budget, and history retention.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use vlmo_common::types::DatasetKind;

/// Default remote index of published VLMO archives.
pub const DEFAULT_BASE_URL: &str = "https://dados.cvm.gov.br/dados/CIA_ABERTA/DOC/VLMO/DADOS/";

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Remote directory index listing the published archives
    pub base_url: Url,
    /// Directory holding the current dataset files and their history
    pub datasets_dir: PathBuf,
    /// Maximum number of concurrent archive fetches
    pub concurrency: usize,
    /// Retry budget per resource (attempts, not extra retries)
    pub max_retries: u32,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Upper bound on the exponential backoff between attempts, in seconds
    pub backoff_cap_secs: u64,
    /// History slots kept per dataset kind
    pub history_retention: usize,
    /// Skip TLS certificate verification. The portal's certificate chain has
    /// been broken in the past; verification stays on unless explicitly
    /// disabled.
    pub accept_invalid_certs: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            // The constant is a valid URL; parsing it cannot fail.
            #[allow(clippy::unwrap_used)]
            base_url: Url::parse(DEFAULT_BASE_URL).unwrap(),
            datasets_dir: PathBuf::from("./datasets"),
            concurrency: 4,
            max_retries: 3,
            request_timeout_secs: 60,
            backoff_cap_secs: 30,
            history_retention: 5,
            accept_invalid_certs: false,
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `VLMO_BASE_URL`: Remote index URL
    /// - `VLMO_DATASETS_DIR`: Dataset directory
    /// - `VLMO_CONCURRENCY`: Concurrent fetch limit
    /// - `VLMO_MAX_RETRIES`: Retry budget per resource
    /// - `VLMO_REQUEST_TIMEOUT_SECS`: Per-request timeout
    /// - `VLMO_BACKOFF_CAP_SECS`: Backoff ceiling between attempts
    /// - `VLMO_HISTORY_RETENTION`: History slots kept per kind
    /// - `VLMO_ACCEPT_INVALID_CERTS`: Disable TLS verification (true/false)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("VLMO_BASE_URL") {
            config.base_url = Url::parse(&url)
                .map_err(|e| anyhow::anyhow!("Invalid VLMO_BASE_URL: {}", e))?;
        }
        if let Ok(dir) = std::env::var("VLMO_DATASETS_DIR") {
            config.datasets_dir = PathBuf::from(dir);
        }
        if let Ok(value) = std::env::var("VLMO_CONCURRENCY") {
            config.concurrency = value.parse().unwrap_or(config.concurrency);
        }
        if let Ok(value) = std::env::var("VLMO_MAX_RETRIES") {
            config.max_retries = value.parse().unwrap_or(config.max_retries);
        }
        if let Ok(value) = std::env::var("VLMO_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = value.parse().unwrap_or(config.request_timeout_secs);
        }
        if let Ok(value) = std::env::var("VLMO_BACKOFF_CAP_SECS") {
            config.backoff_cap_secs = value.parse().unwrap_or(config.backoff_cap_secs);
        }
        if let Ok(value) = std::env::var("VLMO_HISTORY_RETENTION") {
            config.history_retention = value.parse().unwrap_or(config.history_retention);
        }
        if let Ok(value) = std::env::var("VLMO_ACCEPT_INVALID_CERTS") {
            config.accept_invalid_certs = value.parse().unwrap_or(false);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("VLMO_CONCURRENCY must be greater than 0");
        }
        if self.max_retries == 0 {
            anyhow::bail!("VLMO_MAX_RETRIES must be greater than 0");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("VLMO_REQUEST_TIMEOUT_SECS must be greater than 0");
        }
        if self.history_retention == 0 {
            anyhow::bail!("VLMO_HISTORY_RETENTION must be greater than 0");
        }
        Ok(())
    }

    /// Get the per-request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Path of the current dataset file for a kind
    pub fn current_file(&self, kind: DatasetKind) -> PathBuf {
        self.datasets_dir
            .join(format!("Brazil_Stock_Trading_{}.csv", kind.as_str()))
    }

    /// Per-kind history directory holding timestamped snapshots
    pub fn history_dir(&self, kind: DatasetKind) -> PathBuf {
        self.datasets_dir.join("history").join(kind.slug())
    }
}
