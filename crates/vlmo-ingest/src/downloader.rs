//! Concurrent archive fetching
//!
//! Downloads every discovered resource with a bounded worker pool. Each
//! fetch retries transient failures with exponential backoff and gives up
//! permanently once the attempt budget is spent; one resource's permanent
//! failure never cancels its siblings. Workers share nothing — each returns
//! its own outcome and the results are aggregated after the join.

use futures::{stream, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use vlmo_common::checksum;
use vlmo_common::types::ChecksumAlgorithm;

use crate::config::IngestConfig;
use crate::models::DatasetResource;

const USER_AGENT: &str = concat!("vlmo-ingest/", env!("CARGO_PKG_VERSION"));

/// Per-resource fetch failure
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl FetchError {
    /// Transient failures are retried; everything else is permanent.
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            },
            FetchError::Status(status) => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            },
            FetchError::Exhausted { .. } => false,
        }
    }
}

/// Body of one successfully fetched archive
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub sha256: String,
}

/// Result slot for one resource after the fetch stage
#[derive(Debug)]
pub struct FetchOutcome {
    pub resource: DatasetResource,
    pub result: Result<FetchedBody, FetchError>,
}

/// Bounded-concurrency downloader
pub struct Fetcher {
    client: reqwest::Client,
    config: IngestConfig,
}

impl Fetcher {
    pub fn new(config: &IngestConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// The underlying HTTP client, shared with discovery.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch all resources with at most `concurrency` downloads in flight.
    ///
    /// Returns one outcome per resource; completion order is not meaningful
    /// downstream, the merge resolves purely by key and version.
    pub async fn fetch_all(&self, resources: Vec<DatasetResource>) -> Vec<FetchOutcome> {
        let total = resources.len();
        info!(
            count = total,
            concurrency = self.config.concurrency,
            "Fetching archives"
        );

        stream::iter(resources.into_iter().enumerate())
            .map(|(index, resource)| async move {
                info!(
                    file = %resource.file_name,
                    progress = format!("{}/{}", index + 1, total),
                    "Fetching archive"
                );

                let result = self.fetch_with_retry(&resource).await;
                match &result {
                    Ok(body) => info!(
                        file = %resource.file_name,
                        bytes = body.bytes.len(),
                        sha256 = %body.sha256,
                        "Fetched archive"
                    ),
                    Err(e) => error!(
                        file = %resource.file_name,
                        error = %e,
                        "Fetch failed permanently"
                    ),
                }

                FetchOutcome { resource, result }
            })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await
    }

    /// Fetch one resource, retrying transient failures with exponential
    /// backoff (2^attempt seconds, capped by configuration).
    async fn fetch_with_retry(
        &self,
        resource: &DatasetResource,
    ) -> Result<FetchedBody, FetchError> {
        let attempts = self.config.max_retries;
        let mut last_error: Option<FetchError> = None;

        for attempt in 1..=attempts {
            match self.fetch_once(resource).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() => {
                    warn!(
                        file = %resource.file_name,
                        attempt = format!("{}/{}", attempt, attempts),
                        error = %e,
                        "Fetch attempt failed"
                    );
                    last_error = Some(e);

                    if attempt < attempts {
                        let backoff = 2u64.pow(attempt).min(self.config.backoff_cap_secs);
                        tokio::time::sleep(Duration::from_secs(backoff)).await;
                    }
                },
                Err(e) => return Err(e),
            }
        }

        Err(FetchError::Exhausted {
            attempts,
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no error captured".to_string()),
        })
    }

    async fn fetch_once(&self, resource: &DatasetResource) -> Result<FetchedBody, FetchError> {
        let response = self.client.get(resource.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let bytes = response.bytes().await?.to_vec();
        let sha256 = checksum::digest_bytes(&bytes, ChecksumAlgorithm::Sha256);
        Ok(FetchedBody { bytes, sha256 })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use url::Url;
    use vlmo_common::types::VersionLabel;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base: &str) -> IngestConfig {
        IngestConfig {
            base_url: Url::parse(base).unwrap(),
            max_retries: 3,
            backoff_cap_secs: 0,
            request_timeout_secs: 5,
            ..Default::default()
        }
    }

    fn resource(base: &str, name: &str) -> DatasetResource {
        DatasetResource {
            url: Url::parse(base).unwrap().join(name).unwrap(),
            file_name: name.to_string(),
            version: VersionLabel::from_file_name(name).unwrap(),
            kind: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_success_with_checksum() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vlmo_cia_aberta_2023.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive-bytes".to_vec()))
            .mount(&server)
            .await;

        let base = format!("{}/", server.uri());
        let fetcher = Fetcher::new(&test_config(&base)).unwrap();
        let outcomes = fetcher
            .fetch_all(vec![resource(&base, "vlmo_cia_aberta_2023.zip")])
            .await;

        assert_eq!(outcomes.len(), 1);
        let body = outcomes[0].result.as_ref().unwrap();
        assert_eq!(body.bytes, b"archive-bytes");
        assert_eq!(
            body.sha256,
            checksum::digest_bytes(b"archive-bytes", ChecksumAlgorithm::Sha256)
        );
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vlmo_cia_aberta_2023.zip"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/vlmo_cia_aberta_2023.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"late".to_vec()))
            .mount(&server)
            .await;

        let base = format!("{}/", server.uri());
        let fetcher = Fetcher::new(&test_config(&base)).unwrap();
        let outcomes = fetcher
            .fetch_all(vec![resource(&base, "vlmo_cia_aberta_2023.zip")])
            .await;

        assert_eq!(outcomes[0].result.as_ref().unwrap().bytes, b"late");
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vlmo_cia_aberta_2023.zip"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let base = format!("{}/", server.uri());
        let fetcher = Fetcher::new(&test_config(&base)).unwrap();
        let outcomes = fetcher
            .fetch_all(vec![resource(&base, "vlmo_cia_aberta_2023.zip")])
            .await;

        assert!(matches!(
            outcomes[0].result,
            Err(FetchError::Exhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_client_error_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vlmo_cia_aberta_2023.zip"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let base = format!("{}/", server.uri());
        let fetcher = Fetcher::new(&test_config(&base)).unwrap();
        let outcomes = fetcher
            .fetch_all(vec![resource(&base, "vlmo_cia_aberta_2023.zip")])
            .await;

        assert!(matches!(
            outcomes[0].result,
            Err(FetchError::Status(status)) if status == reqwest::StatusCode::NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_siblings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vlmo_cia_aberta_2022.zip"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/vlmo_cia_aberta_2023.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let base = format!("{}/", server.uri());
        let fetcher = Fetcher::new(&test_config(&base)).unwrap();
        let outcomes = fetcher
            .fetch_all(vec![
                resource(&base, "vlmo_cia_aberta_2022.zip"),
                resource(&base, "vlmo_cia_aberta_2023.zip"),
            ])
            .await;

        let failed = outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .count();
        let succeeded = outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .count();
        assert_eq!((failed, succeeded), (1, 1));
    }
}
