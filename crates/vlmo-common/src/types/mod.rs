//! Common domain types used across VLMO

use crate::error::VlmoError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The two record categories published by the source.
///
/// Both kinds flow through the same pipeline but are merged and persisted
/// separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DatasetKind {
    Consolidated,
    Individual,
}

impl DatasetKind {
    /// All kinds, in processing order.
    pub const ALL: [DatasetKind; 2] = [DatasetKind::Consolidated, DatasetKind::Individual];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Consolidated => "Consolidated",
            DatasetKind::Individual => "Individual",
        }
    }

    /// Lowercase identifier used for directory names and CLI values.
    pub fn slug(&self) -> &'static str {
        match self {
            DatasetKind::Consolidated => "consolidated",
            DatasetKind::Individual => "individual",
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DatasetKind {
    type Err = VlmoError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "consolidated" | "con" => Ok(DatasetKind::Consolidated),
            "individual" | "ind" => Ok(DatasetKind::Individual),
            _ => Err(VlmoError::InvalidKind(s.to_string())),
        }
    }
}

/// Version label attached to a published source file.
///
/// The source names its archives by period (`vlmo_cia_aberta_2024.zip`,
/// occasionally `..._2024_06.zip` for a mid-year republication). The label
/// keeps the raw string for display and the parsed period for ordering: a
/// bare year sorts before any month-qualified label of the same year.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct VersionLabel {
    raw: String,
    year: u16,
    month: Option<u8>,
}

impl VersionLabel {
    /// Parse a label string (`2024`, `2024-06`, `2024_06`).
    pub fn parse(label: &str) -> crate::Result<Self> {
        let pattern = Regex::new(r"^(\d{4})(?:[-_](\d{1,2}))?$")
            .map_err(|e| VlmoError::Unknown(e.to_string()))?;
        let captures = pattern
            .captures(label.trim())
            .ok_or_else(|| VlmoError::InvalidVersion(label.to_string()))?;

        let year: u16 = captures[1]
            .parse()
            .map_err(|_| VlmoError::InvalidVersion(label.to_string()))?;
        let month = match captures.get(2) {
            Some(m) => {
                let month: u8 = m
                    .as_str()
                    .parse()
                    .map_err(|_| VlmoError::InvalidVersion(label.to_string()))?;
                if !(1..=12).contains(&month) {
                    return Err(VlmoError::InvalidVersion(label.to_string()));
                }
                Some(month)
            },
            None => None,
        };

        Ok(Self {
            raw: label.trim().to_string(),
            year,
            month,
        })
    }

    /// Derive the label from a published archive file name.
    ///
    /// Returns `None` when the name carries no recognizable period, which
    /// lets discovery skip unrelated links in the remote index.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let pattern = Regex::new(r"(\d{4})(?:[-_](\d{2}))?\.(?i:zip)$").ok()?;
        let captures = pattern.captures(file_name)?;

        let raw = captures.get(0)?.as_str();
        let raw = &raw[..raw.len() - 4]; // strip ".zip"
        Self::parse(raw).ok()
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> Option<u8> {
        self.month
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for VersionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for VersionLabel {
    type Err = VlmoError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionLabel {
    type Error = VlmoError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionLabel> for String {
    fn from(label: VersionLabel) -> String {
        label.raw
    }
}

impl PartialEq for VersionLabel {
    fn eq(&self, other: &Self) -> bool {
        self.year == other.year && self.month == other.month
    }
}

impl Eq for VersionLabel {}

impl std::hash::Hash for VersionLabel {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.year.hash(state);
        self.month.hash(state);
    }
}

impl PartialOrd for VersionLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        // None (whole-year file) sorts before any month of the same year
        match self.year.cmp(&other.year) {
            Ordering::Equal => self.month.cmp(&other.month),
            other => other,
        }
    }
}

/// Checksum algorithm type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha512,
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumAlgorithm::Sha256 => write!(f, "sha256"),
            ChecksumAlgorithm::Sha512 => write!(f, "sha512"),
        }
    }
}
