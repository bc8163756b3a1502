//! Domain models for the acquisition pipeline
//!
//! The source publishes one ZIP archive per period; each archive carries one
//! consolidated and one individual CSV. `DatasetResource` and `RawPayload`
//! describe the in-flight shapes, `Record` is the canonical normalized row
//! persisted to the dataset files.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;
use vlmo_common::types::{DatasetKind, VersionLabel};

/// Declared text encoding of a tabular payload.
///
/// The source files use a Latin-derived Brazilian Portuguese encoding; the
/// pipeline never assumes UTF-8 for inbound data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    /// ISO-8859-1 / Windows-1252 family used by the CVM portal
    Latin1,
    Utf8,
}

impl SourceEncoding {
    /// Decode raw payload bytes into a UTF-8 string.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            SourceEncoding::Latin1 => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
            SourceEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// One remote archive discovered in the source index.
///
/// Immutable once discovered. The source packages both dataset kinds inside a
/// single archive per version, so the kind restriction requested at discovery
/// time travels with the resource and is enforced during extraction.
#[derive(Debug, Clone)]
pub struct DatasetResource {
    pub url: Url,
    pub file_name: String,
    pub version: VersionLabel,
    /// When set, extraction keeps only payloads of this kind.
    pub kind: Option<DatasetKind>,
}

/// Bytes of one decompressed tabular file, tagged with everything the
/// normalizer needs. Discarded after parsing.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub file_name: String,
    pub kind: DatasetKind,
    pub encoding: SourceEncoding,
    pub version: VersionLabel,
    pub bytes: Vec<u8>,
}

/// Canonical record of one insider-trading movement or filing.
///
/// Serde renames match the canonical column names of the persisted dataset
/// files. Kind-specific columns are optional; monetary fields are exact
/// decimals, never floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Company_CNPJ")]
    pub company_cnpj: String,
    #[serde(rename = "Company_Name")]
    pub company_name: String,
    #[serde(rename = "Reference_Date")]
    pub reference_date: NaiveDate,
    /// Row-level filing version from the source (`Versao`); non-numeric
    /// values in the source collapse to `None`.
    #[serde(rename = "Version")]
    pub filing_version: Option<u32>,

    // Consolidated movement columns
    #[serde(rename = "Movement_Date")]
    pub movement_date: Option<NaiveDate>,
    #[serde(rename = "Movement_Type")]
    pub movement_type: Option<String>,
    #[serde(rename = "Operation_Type")]
    pub operation_type: Option<String>,
    #[serde(rename = "Asset_Type")]
    pub asset_type: Option<String>,
    #[serde(rename = "Position_Type")]
    pub position_type: Option<String>,
    #[serde(rename = "Intermediary")]
    pub intermediary: Option<String>,
    #[serde(rename = "Quantity")]
    pub quantity: Option<Decimal>,
    #[serde(rename = "Unit_Price")]
    pub unit_price: Option<Decimal>,
    #[serde(rename = "Volume")]
    pub volume: Option<Decimal>,

    // Individual filing columns
    #[serde(rename = "CVM_Code")]
    pub cvm_code: Option<String>,
    #[serde(rename = "Category")]
    pub category: Option<String>,
    #[serde(rename = "Type")]
    pub doc_type: Option<String>,
    #[serde(rename = "Delivery_Date")]
    pub delivery_date: Option<NaiveDate>,
    #[serde(rename = "Presentation_Type")]
    pub presentation_type: Option<String>,
    #[serde(rename = "Delivery_Protocol")]
    pub delivery_protocol: Option<String>,

    #[serde(rename = "File_Type")]
    pub kind: DatasetKind,
    /// Version label of the source file this record came from; drives merge
    /// recency and must survive a restart, hence persisted.
    #[serde(rename = "Source_Version")]
    pub source_version: VersionLabel,
}

impl Record {
    /// The natural key identifying this logical record across all source
    /// versions.
    pub fn natural_key(&self) -> NaturalKey {
        match self.kind {
            DatasetKind::Consolidated => NaturalKey::Consolidated {
                company_cnpj: self.company_cnpj.clone(),
                reference_date: self.reference_date,
                movement_date: self.movement_date,
                movement_type: self.movement_type.clone().unwrap_or_default(),
            },
            DatasetKind::Individual => NaturalKey::Individual {
                company_cnpj: self.company_cnpj.clone(),
                reference_date: self.reference_date,
                cvm_code: self.cvm_code.clone().unwrap_or_default(),
                category: self.category.clone().unwrap_or_default(),
                doc_type: self.doc_type.clone().unwrap_or_default(),
            },
        }
    }
}

/// Natural key of a [`Record`], per dataset kind.
///
/// Deduplication works on these keys rather than byte-identical rows, so a
/// revised source version can correct a previously published row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NaturalKey {
    Consolidated {
        company_cnpj: String,
        reference_date: NaiveDate,
        movement_date: Option<NaiveDate>,
        movement_type: String,
    },
    Individual {
        company_cnpj: String,
        reference_date: NaiveDate,
        cvm_code: String,
        category: String,
        doc_type: String,
    },
}
