//! VLMO Ingest Library
//!
//! Acquisition-and-merge pipeline for the CVM insider-trading datasets
//! (VLMO): discovers the published archive versions, fetches them
//! concurrently, normalizes the heterogeneous CSV payloads, merges them into
//! the rolling consolidated and individual datasets with version-aware
//! deduplication, and rotates timestamped backups of the previous files.
//!
//! # Example
//!
//! ```no_run
//! use vlmo_ingest::{IngestConfig, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let pipeline = Pipeline::new(config)?;
//!     let summary = pipeline.run(None).await?;
//!     println!("fetched {} archives", summary.archives.len());
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod backup;
pub mod config;
pub mod dataset;
pub mod discovery;
pub mod downloader;
pub mod merge;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod report;

// Re-export the main entry points
pub use config::IngestConfig;
pub use pipeline::{Pipeline, RunSummary};
