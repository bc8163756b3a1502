//! Run reporting
//!
//! Consumes the pipeline's [`RunSummary`]: renders a console report and keeps
//! `run_history.json` up to date so the next run can show how many records
//! arrived since the previous one. This module only formats and records
//! pipeline output; it takes no part in the pipeline itself. The console
//! report is program output, which is why it uses `println!` rather than the
//! tracing macros.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::pipeline::RunSummary;

/// Persisted state of previous runs
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RunHistory {
    pub last_run: Option<LastRun>,
}

/// Snapshot of the previous run's totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastRun {
    pub timestamp: DateTime<Utc>,
    /// Kind slug → total records at the end of that run
    pub total_records: BTreeMap<String, usize>,
}

/// Renders run summaries and tracks run history
pub struct Reporter {
    history_path: PathBuf,
}

impl Reporter {
    pub fn new(datasets_dir: &Path) -> Self {
        Self {
            history_path: datasets_dir.join("run_history.json"),
        }
    }

    /// Load the run history; a missing or unreadable file starts fresh.
    pub fn load_history(&self) -> RunHistory {
        std::fs::read_to_string(&self.history_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// Record this run's totals for the next run's delta. Kinds that were
    /// skipped or failed keep their previous totals.
    pub fn record_run(&self, summary: &RunSummary) -> vlmo_common::Result<()> {
        let mut totals = self
            .load_history()
            .last_run
            .map(|last| last.total_records)
            .unwrap_or_default();

        for kind in &summary.kinds {
            if kind.committed_path.is_some() {
                totals.insert(kind.kind.slug().to_string(), kind.stats.total);
            }
        }

        let history = RunHistory {
            last_run: Some(LastRun {
                timestamp: summary.started_at,
                total_records: totals,
            }),
        };

        if let Some(parent) = self.history_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(
            &self.history_path,
            serde_json::to_string_pretty(&history)?,
        )?;
        Ok(())
    }

    /// Print the run report to the console.
    ///
    /// Call before [`Self::record_run`] so the since-last-run delta still
    /// compares against the previous run.
    pub fn print_report(&self, summary: &RunSummary) {
        let previous = self.load_history().last_run;

        println!();
        println!("{}", "=".repeat(50));
        println!("VLMO Data Extraction Report");
        println!("{}", "=".repeat(50));
        println!();
        println!("Run:      {}", summary.run_id);
        println!("Started:  {}", summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!(
            "Archives: {} fetched / {} discovered",
            summary.archives.len(),
            summary.resources_discovered
        );
        println!();

        for kind in &summary.kinds {
            println!("{}:", kind.kind);
            match &kind.error {
                Some(error) => println!("  FAILED: {}", error),
                None if kind.committed_path.is_none() => {
                    println!("  skipped (no incoming records)")
                },
                None => {
                    println!("  Total records:  {}", kind.stats.total);
                    println!(
                        "  Merged:         {} new, {} updated, {} duplicate",
                        kind.stats.new, kind.stats.updated, kind.stats.duplicate
                    );
                    let since_last = previous
                        .as_ref()
                        .and_then(|last| last.total_records.get(kind.kind.slug()))
                        .map(|&before| kind.stats.total as i64 - before as i64);
                    if let Some(delta) = since_last {
                        println!("  Since last run: {:+}", delta);
                    }
                },
            }
            println!();
        }

        if summary.rows_skipped > 0 {
            println!(
                "Rows skipped: {} of {} (data-quality warnings)",
                summary.rows_skipped, summary.rows_total
            );
        }

        if !summary.failed_resources.is_empty() {
            println!("Skipped resources:");
            for failed in &summary.failed_resources {
                println!("  {} [{}]: {}", failed.name, failed.stage, failed.reason);
            }
            println!();
        }

        println!(
            "Timings: discovery {:.2}s, fetch {:.2}s, process {:.2}s, persist {:.2}s",
            summary.timings.discovery_secs,
            summary.timings.fetch_secs,
            summary.timings.process_secs,
            summary.timings.persist_secs
        );
        println!("{}", "=".repeat(50));
    }
}
