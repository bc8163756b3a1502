//! VLMO Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the VLMO workspace.
//!
//! # Overview
//!
//! This crate provides common functionality used across all VLMO workspace
//! members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Checksums**: Digest utilities for downloaded archive verification
//! - **Types**: Shared domain types (dataset kinds, version labels)
//! - **Logging**: Centralized tracing initialization
//!
//! # Example
//!
//! ```no_run
//! use vlmo_common::types::VersionLabel;
//!
//! let label = VersionLabel::from_file_name("vlmo_cia_aberta_2024.zip");
//! assert!(label.is_some());
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, VlmoError};
