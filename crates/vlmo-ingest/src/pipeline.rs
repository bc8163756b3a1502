//! Run orchestration
//!
//! One linear pipeline per run: discover → fetch (parallel, joined) →
//! extract + normalize → merge and commit per kind. Everything the run
//! learns about itself accumulates in an explicit [`RunSummary`] value that
//! is returned to the caller; there is no ambient mutable run state. The two
//! dataset kinds are committed independently, so a persistence failure on
//! one never blocks the other.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;
use vlmo_common::types::{DatasetKind, VersionLabel};

use crate::archive;
use crate::backup::BackupRotator;
use crate::config::IngestConfig;
use crate::dataset::Dataset;
use crate::discovery::SourceCatalog;
use crate::downloader::Fetcher;
use crate::merge::{self, MergeStats};
use crate::models::Record;
use crate::parser;

/// Wall-clock seconds spent per stage
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub discovery_secs: f64,
    pub fetch_secs: f64,
    pub process_secs: f64,
    pub persist_secs: f64,
}

/// A resource (or payload) the run had to skip, with the stage and reason
#[derive(Debug, Clone, Serialize)]
pub struct FailedResource {
    pub name: String,
    pub stage: &'static str,
    pub reason: String,
}

/// A successfully fetched archive, for audit logging
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveInfo {
    pub file_name: String,
    pub version: VersionLabel,
    pub sha256: String,
    pub bytes: usize,
}

/// Per-kind outcome of the merge-and-commit stage
#[derive(Debug, Clone, Serialize)]
pub struct KindSummary {
    pub kind: DatasetKind,
    pub stats: MergeStats,
    /// Path of the committed current file; `None` when the kind was skipped
    /// (no incoming data) or its commit failed
    pub committed_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// Structured result of one run, consumed by the reporting collaborator
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub resources_discovered: usize,
    pub archives: Vec<ArchiveInfo>,
    pub failed_resources: Vec<FailedResource>,
    pub rows_total: usize,
    pub rows_skipped: usize,
    pub kinds: Vec<KindSummary>,
    pub timings: StageTimings,
}

impl RunSummary {
    /// True when any kind failed to load or commit.
    pub fn has_kind_errors(&self) -> bool {
        self.kinds.iter().any(|k| k.error.is_some())
    }
}

/// The acquisition-and-merge pipeline
pub struct Pipeline {
    catalog: SourceCatalog,
    fetcher: Fetcher,
    rotator: BackupRotator,
}

impl Pipeline {
    pub fn new(config: IngestConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::new(&config).context("Failed to build HTTP client")?;
        let catalog = SourceCatalog::new(fetcher.client().clone(), config.base_url.clone());
        let rotator = BackupRotator::new(&config);

        Ok(Self {
            catalog,
            fetcher,
            rotator,
        })
    }

    /// Execute one run, optionally restricted to a single dataset kind.
    ///
    /// Only discovery failure aborts: nothing has been written yet and the
    /// existing dataset files stay valid. Per-resource and per-row failures
    /// are folded into the summary and the run continues on partial data.
    pub async fn run(&self, kind: Option<DatasetKind>) -> anyhow::Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, "Starting sync run");

        let stage = Instant::now();
        let resources = self
            .catalog
            .discover(kind)
            .await
            .context("Discovery failed; existing datasets left untouched")?;
        let discovery_secs = stage.elapsed().as_secs_f64();
        let resources_discovered = resources.len();

        let stage = Instant::now();
        let outcomes = self.fetcher.fetch_all(resources).await;
        let fetch_secs = stage.elapsed().as_secs_f64();

        let mut failed_resources = Vec::new();
        let mut archives = Vec::new();
        let mut fetched = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(body) => {
                    archives.push(ArchiveInfo {
                        file_name: outcome.resource.file_name.clone(),
                        version: outcome.resource.version.clone(),
                        sha256: body.sha256,
                        bytes: body.bytes.len(),
                    });
                    fetched.push((outcome.resource, body.bytes));
                },
                Err(e) => failed_resources.push(FailedResource {
                    name: outcome.resource.file_name.clone(),
                    stage: "fetch",
                    reason: e.to_string(),
                }),
            }
        }

        // Process in version order: the merged dataset is order-independent,
        // but this keeps the new/updated counters deterministic across runs.
        fetched.sort_by(|a, b| a.0.version.cmp(&b.0.version));

        let stage = Instant::now();
        let mut per_kind: BTreeMap<DatasetKind, Vec<Record>> = BTreeMap::new();
        let mut rows_total = 0;
        let mut rows_skipped = 0;

        for (resource, bytes) in &fetched {
            let payloads = match archive::extract(resource, bytes) {
                Ok(payloads) => payloads,
                Err(e) => {
                    warn!(file = %resource.file_name, error = %e, "Skipping unreadable archive");
                    failed_resources.push(FailedResource {
                        name: resource.file_name.clone(),
                        stage: "extract",
                        reason: e.to_string(),
                    });
                    continue;
                },
            };

            for payload in payloads {
                match parser::normalize(&payload) {
                    Ok(batch) => {
                        rows_total += batch.rows_total;
                        rows_skipped += batch.rows_skipped;
                        per_kind
                            .entry(payload.kind)
                            .or_default()
                            .extend(batch.records);
                    },
                    Err(e) => {
                        warn!(file = %payload.file_name, error = %e, "Skipping unparseable payload");
                        failed_resources.push(FailedResource {
                            name: payload.file_name.clone(),
                            stage: "parse",
                            reason: e.to_string(),
                        });
                    },
                }
            }
        }
        let process_secs = stage.elapsed().as_secs_f64();

        let kinds_to_run: Vec<DatasetKind> = match kind {
            Some(k) => vec![k],
            None => DatasetKind::ALL.to_vec(),
        };

        let stage = Instant::now();
        let mut kinds = Vec::new();
        for k in kinds_to_run {
            let incoming = per_kind.remove(&k).unwrap_or_default();
            kinds.push(self.merge_and_commit(k, incoming));
        }
        let persist_secs = stage.elapsed().as_secs_f64();

        let summary = RunSummary {
            run_id,
            started_at,
            resources_discovered,
            archives,
            failed_resources,
            rows_total,
            rows_skipped,
            kinds,
            timings: StageTimings {
                discovery_secs,
                fetch_secs,
                process_secs,
                persist_secs,
            },
        };

        info!(
            run_id = %run_id,
            discovered = summary.resources_discovered,
            fetched = summary.archives.len(),
            failed = summary.failed_resources.len(),
            rows_skipped = summary.rows_skipped,
            "Sync run finished"
        );
        Ok(summary)
    }

    /// Merge the incoming batch into a kind's dataset and commit it.
    ///
    /// Failures here are scoped to the kind: the summary records them and the
    /// caller carries on with the other kind.
    fn merge_and_commit(&self, kind: DatasetKind, incoming: Vec<Record>) -> KindSummary {
        if incoming.is_empty() {
            info!(kind = %kind, "No incoming records; current dataset left unchanged");
            return KindSummary {
                kind,
                stats: MergeStats::default(),
                committed_path: None,
                error: None,
            };
        }

        let current = self.rotator.current_path(kind);
        let mut dataset = match Dataset::load(&current, kind) {
            Ok(dataset) => dataset,
            Err(e) => {
                error!(kind = %kind, error = %e, "Could not load current dataset");
                return KindSummary {
                    kind,
                    stats: MergeStats::default(),
                    committed_path: None,
                    error: Some(e.to_string()),
                };
            },
        };

        let stats = merge::merge(&mut dataset, incoming);

        match self.rotator.commit(&dataset) {
            Ok(path) => KindSummary {
                kind,
                stats,
                committed_path: Some(path),
                error: None,
            },
            Err(e) => {
                error!(kind = %kind, error = %e, "Commit failed");
                KindSummary {
                    kind,
                    stats,
                    committed_path: None,
                    error: Some(e.to_string()),
                }
            },
        }
    }
}
