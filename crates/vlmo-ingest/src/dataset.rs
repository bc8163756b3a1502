//! Persisted dataset model
//!
//! A [`Dataset`] is the rolling collection of records for one kind, keyed by
//! natural key (no two records ever share one). It is loaded from the current
//! CSV file at run start, mutated in memory by the merge engine, and written
//! back by the backup rotator. Canonical files are UTF-8, comma-delimited,
//! ISO dates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use vlmo_common::types::DatasetKind;

use crate::models::{NaturalKey, Record};

/// Filesystem failure while reading or writing dataset files
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Rolling record collection for one dataset kind
#[derive(Debug, Clone)]
pub struct Dataset {
    kind: DatasetKind,
    records: BTreeMap<NaturalKey, Record>,
}

impl Dataset {
    pub fn new(kind: DatasetKind) -> Self {
        Self {
            kind,
            records: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &NaturalKey) -> Option<&Record> {
        self.records.get(key)
    }

    /// Records in natural-key order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Insert a record under its natural key, returning the displaced record
    /// if one was present.
    pub fn insert(&mut self, record: Record) -> Option<Record> {
        self.records.insert(record.natural_key(), record)
    }

    /// Load the dataset from its current file; a missing file yields an
    /// empty dataset (first run, or nothing committed yet).
    pub fn load(path: &Path, kind: DatasetKind) -> Result<Self, PersistenceError> {
        let mut dataset = Self::new(kind);

        if !path.exists() {
            debug!(path = %path.display(), kind = %kind, "No current dataset file, starting empty");
            return Ok(dataset);
        }

        let mut reader = csv::Reader::from_path(path).map_err(|source| PersistenceError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

        for row in reader.deserialize::<Record>() {
            let record = row.map_err(|source| PersistenceError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            dataset.insert(record);
        }

        debug!(
            path = %path.display(),
            kind = %kind,
            records = dataset.len(),
            "Loaded current dataset"
        );
        Ok(dataset)
    }

    /// Write the dataset to `path` as canonical UTF-8 CSV.
    ///
    /// Callers that need crash safety write to a temporary sibling and rename
    /// over the final path (see the backup rotator).
    pub fn write(&self, path: &Path) -> Result<(), PersistenceError> {
        let mut writer = csv::Writer::from_path(path).map_err(|source| PersistenceError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

        for record in self.records.values() {
            writer
                .serialize(record)
                .map_err(|source| PersistenceError::Csv {
                    path: path.to_path_buf(),
                    source,
                })?;
        }

        writer.flush().map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}
