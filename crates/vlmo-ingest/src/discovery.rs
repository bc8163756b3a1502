//! Source catalog discovery
//!
//! Lists the remote directory index and turns every published archive link
//! into a [`DatasetResource`]. The source keeps superseded years online next
//! to the current one, so discovery returns every version it can see and the
//! merge engine sorts out recency. Discovery failure is fatal for the run:
//! with no catalog there is nothing to fetch, and the existing datasets stay
//! untouched.

use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;
use vlmo_common::types::{DatasetKind, VersionLabel};

use crate::models::DatasetResource;

/// Fatal discovery failure
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("failed to reach source index: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source index returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("source index has no recognizable archive links")]
    NoArchives,
}

/// Discovers published dataset archives from the remote index
pub struct SourceCatalog {
    client: reqwest::Client,
    base_url: Url,
}

impl SourceCatalog {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Enumerate all currently published archives, oldest version first.
    ///
    /// When `kind` is set, the returned resources restrict extraction to that
    /// kind; the archives themselves are shared between kinds.
    pub async fn discover(
        &self,
        kind: Option<DatasetKind>,
    ) -> Result<Vec<DatasetResource>, DiscoveryError> {
        info!(url = %self.base_url, "Listing source index");

        let response = self.client.get(self.base_url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status(status));
        }

        let body = response.text().await?;
        let mut resources = self.parse_index(&body, kind)?;
        resources.sort_by(|a, b| a.version.cmp(&b.version));

        info!(count = resources.len(), "Discovered published archives");
        Ok(resources)
    }

    /// Extract archive links from the index HTML.
    fn parse_index(
        &self,
        html: &str,
        kind: Option<DatasetKind>,
    ) -> Result<Vec<DatasetResource>, DiscoveryError> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("a[href]").map_err(|_| DiscoveryError::NoArchives)?;

        let mut resources = Vec::new();
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if !href.to_lowercase().ends_with(".zip") {
                continue;
            }

            let file_name = href.rsplit('/').next().unwrap_or(href).to_string();
            let Some(version) = VersionLabel::from_file_name(&file_name) else {
                debug!(href = %href, "Skipping archive link without a version label");
                continue;
            };

            let url = match self.base_url.join(href) {
                Ok(url) => url,
                Err(e) => {
                    warn!(href = %href, error = %e, "Skipping unresolvable archive link");
                    continue;
                },
            };

            debug!(file = %file_name, version = %version, "Discovered archive");
            resources.push(DatasetResource {
                url,
                file_name,
                version,
                kind,
            });
        }

        if resources.is_empty() {
            return Err(DiscoveryError::NoArchives);
        }
        Ok(resources)
    }
}
