//! Backup rotation and dataset commit
//!
//! Persists a merged dataset as the new current file. The previous current
//! file is copied into a per-kind history directory under a timestamped name
//! before being replaced; the replacement itself goes through a temporary
//! sibling and an atomic rename so a crash never leaves a half-written
//! current file visible. History beyond the retention count is pruned.

use chrono::{Local, NaiveDateTime};
use std::path::PathBuf;
use tracing::{info, warn};
use vlmo_common::types::DatasetKind;

use crate::config::IngestConfig;
use crate::dataset::{Dataset, PersistenceError};

const SLOT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Commits datasets and rotates their history snapshots
pub struct BackupRotator {
    config: IngestConfig,
}

impl BackupRotator {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Path of the current dataset file for a kind
    pub fn current_path(&self, kind: DatasetKind) -> PathBuf {
        self.config.current_file(kind)
    }

    /// Commit the dataset as the new current file for its kind.
    pub fn commit(&self, dataset: &Dataset) -> Result<PathBuf, PersistenceError> {
        self.commit_at(dataset, Local::now().naive_local())
    }

    /// Commit with an explicit timestamp for the history slot name.
    pub(crate) fn commit_at(
        &self,
        dataset: &Dataset,
        timestamp: NaiveDateTime,
    ) -> Result<PathBuf, PersistenceError> {
        let kind = dataset.kind();
        let current = self.current_path(kind);

        std::fs::create_dir_all(&self.config.datasets_dir).map_err(|source| {
            PersistenceError::Io {
                path: self.config.datasets_dir.clone(),
                source,
            }
        })?;

        if current.exists() {
            let slot = self.reserve_slot(kind, timestamp)?;
            std::fs::copy(&current, &slot).map_err(|source| PersistenceError::Io {
                path: slot.clone(),
                source,
            })?;
            info!(kind = %kind, slot = %slot.display(), "Archived previous dataset");
        }

        let tmp = current.with_extension("tmp");
        dataset.write(&tmp)?;
        std::fs::rename(&tmp, &current).map_err(|source| PersistenceError::Io {
            path: current.clone(),
            source,
        })?;

        info!(
            kind = %kind,
            path = %current.display(),
            records = dataset.len(),
            "Committed dataset"
        );

        self.prune(kind);
        Ok(current)
    }

    /// History slot paths for a kind, newest first.
    pub fn history_slots(&self, kind: DatasetKind) -> Result<Vec<PathBuf>, PersistenceError> {
        let dir = self.config.history_dir(kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&dir).map_err(|source| PersistenceError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut slots: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|ext| ext == "csv").unwrap_or(false))
            .collect();

        // slot names are timestamps, so lexical order is chronological
        slots.sort();
        slots.reverse();
        Ok(slots)
    }

    /// Pick an unused slot path for the timestamp, suffixing on collision.
    fn reserve_slot(
        &self,
        kind: DatasetKind,
        timestamp: NaiveDateTime,
    ) -> Result<PathBuf, PersistenceError> {
        let dir = self.config.history_dir(kind);
        std::fs::create_dir_all(&dir).map_err(|source| PersistenceError::Io {
            path: dir.clone(),
            source,
        })?;

        let stamp = timestamp.format(SLOT_TIMESTAMP_FORMAT).to_string();
        let mut slot = dir.join(format!("{}.csv", stamp));
        let mut suffix = 1;
        while slot.exists() {
            slot = dir.join(format!("{}_{}.csv", stamp, suffix));
            suffix += 1;
        }
        Ok(slot)
    }

    /// Delete history slots beyond the retention count. Best effort: a prune
    /// failure downgrades to a warning, the commit already succeeded.
    fn prune(&self, kind: DatasetKind) {
        let slots = match self.history_slots(kind) {
            Ok(slots) => slots,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Could not list history slots for pruning");
                return;
            },
        };

        for stale in slots.iter().skip(self.config.history_retention) {
            match std::fs::remove_file(stale) {
                Ok(()) => info!(kind = %kind, slot = %stale.display(), "Pruned history slot"),
                Err(e) => {
                    warn!(kind = %kind, slot = %stale.display(), error = %e, "Could not prune history slot")
                },
            }
        }
    }
}
