//! Record normalization
//!
//! Turns a raw tabular payload into canonical [`Record`]s: decodes the
//! declared source encoding, maps source column names onto the canonical
//! schema, converts dates, and parses monetary columns into exact decimals.
//! A malformed row is skipped and counted; it never aborts the payload.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;
use vlmo_common::types::DatasetKind;

use crate::models::{RawPayload, Record};

/// Payload-level normalization failure (scoped to one file)
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("payload {file}: missing required column {column}")]
    MissingColumn { file: String, column: String },

    #[error("payload {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },
}

/// Result of normalizing one payload
#[derive(Debug)]
pub struct NormalizedBatch {
    pub records: Vec<Record>,
    pub rows_total: usize,
    pub rows_skipped: usize,
}

/// Normalize one payload into canonical records.
pub fn normalize(payload: &RawPayload) -> Result<NormalizedBatch, ParseError> {
    let decoded = payload.encoding.decode(&payload.bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(decoded.as_bytes());

    let headers = reader
        .headers()
        .map_err(|source| ParseError::Csv {
            file: payload.file_name.clone(),
            source,
        })?
        .clone();
    let columns = ColumnMap::new(&headers);
    columns.require_for(payload)?;

    let mut records = Vec::new();
    let mut rows_total = 0;
    let mut rows_skipped = 0;

    for (row_number, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                rows_total += 1;
                rows_skipped += 1;
                warn!(
                    file = %payload.file_name,
                    row = row_number + 1,
                    error = %e,
                    "Skipping unreadable row"
                );
                continue;
            },
        };

        rows_total += 1;
        match parse_row(payload, &columns, &row) {
            Ok(record) => records.push(record),
            Err(issue) => {
                rows_skipped += 1;
                warn!(
                    file = %payload.file_name,
                    row = row_number + 1,
                    issue = %issue,
                    "Skipping malformed row"
                );
            },
        }
    }

    Ok(NormalizedBatch {
        records,
        rows_total,
        rows_skipped,
    })
}

/// Source header name → column index lookup
struct ColumnMap {
    indices: HashMap<String, usize>,
}

impl ColumnMap {
    fn new(headers: &csv::StringRecord) -> Self {
        let indices = headers
            .iter()
            .enumerate()
            .map(|(index, name)| (name.trim().to_string(), index))
            .collect();
        Self { indices }
    }

    fn get<'a>(&self, row: &'a csv::StringRecord, column: &str) -> Option<&'a str> {
        self.indices
            .get(column)
            .and_then(|&index| row.get(index))
    }

    /// The key columns must exist per kind; everything else is optional.
    fn require_for(&self, payload: &RawPayload) -> Result<(), ParseError> {
        let required: &[&str] = match payload.kind {
            DatasetKind::Consolidated => &[
                "CNPJ_Companhia",
                "Data_Referencia",
                "Data_Movimentacao",
                "Tipo_Movimentacao",
            ],
            DatasetKind::Individual => &[
                "CNPJ_Companhia",
                "Data_Referencia",
                "Codigo_CVM",
                "Categoria",
                "Tipo",
            ],
        };

        for column in required {
            if !self.indices.contains_key(*column) {
                return Err(ParseError::MissingColumn {
                    file: payload.file_name.clone(),
                    column: (*column).to_string(),
                });
            }
        }
        Ok(())
    }
}

fn parse_row(
    payload: &RawPayload,
    columns: &ColumnMap,
    row: &csv::StringRecord,
) -> Result<Record, String> {
    let company_cnpj = clean_text(columns.get(row, "CNPJ_Companhia").unwrap_or_default())
        .ok_or("empty CNPJ_Companhia")?;
    let company_name =
        clean_text(columns.get(row, "Nome_Companhia").unwrap_or_default()).unwrap_or_default();
    let reference_date = parse_date(columns.get(row, "Data_Referencia").unwrap_or_default())
        .map_err(|e| format!("Data_Referencia: {}", e))?;
    let filing_version = columns
        .get(row, "Versao")
        .and_then(|v| v.trim().parse::<u32>().ok());

    let mut record = Record {
        company_cnpj,
        company_name,
        reference_date,
        filing_version,
        movement_date: None,
        movement_type: None,
        operation_type: None,
        asset_type: None,
        position_type: None,
        intermediary: None,
        quantity: None,
        unit_price: None,
        volume: None,
        cvm_code: None,
        category: None,
        doc_type: None,
        delivery_date: None,
        presentation_type: None,
        delivery_protocol: None,
        kind: payload.kind,
        source_version: payload.version.clone(),
    };

    match payload.kind {
        DatasetKind::Consolidated => {
            record.movement_date =
                parse_optional_date(columns.get(row, "Data_Movimentacao").unwrap_or_default())
                    .map_err(|e| format!("Data_Movimentacao: {}", e))?;
            record.movement_type =
                clean_text(columns.get(row, "Tipo_Movimentacao").unwrap_or_default());
            record.operation_type =
                clean_text(columns.get(row, "Tipo_Operacao").unwrap_or_default());
            record.asset_type = clean_text(columns.get(row, "Tipo_Ativo").unwrap_or_default());
            record.position_type = clean_text(columns.get(row, "Tipo_Cargo").unwrap_or_default());
            record.intermediary =
                clean_text(columns.get(row, "Intermediario").unwrap_or_default());
            record.quantity = parse_decimal(columns.get(row, "Quantidade").unwrap_or_default())
                .map_err(|e| format!("Quantidade: {}", e))?;
            record.unit_price =
                parse_decimal(columns.get(row, "Preco_Unitario").unwrap_or_default())
                    .map_err(|e| format!("Preco_Unitario: {}", e))?;
            record.volume = parse_decimal(columns.get(row, "Volume").unwrap_or_default())
                .map_err(|e| format!("Volume: {}", e))?;
        },
        DatasetKind::Individual => {
            record.cvm_code = clean_text(columns.get(row, "Codigo_CVM").unwrap_or_default());
            record.category = clean_text(columns.get(row, "Categoria").unwrap_or_default());
            record.doc_type = clean_text(columns.get(row, "Tipo").unwrap_or_default());
            record.delivery_date =
                parse_optional_date(columns.get(row, "Data_Entrega").unwrap_or_default())
                    .map_err(|e| format!("Data_Entrega: {}", e))?;
            record.presentation_type =
                clean_text(columns.get(row, "Tipo_Apresentacao").unwrap_or_default());
            record.delivery_protocol =
                clean_text(columns.get(row, "Protocolo_Entrega").unwrap_or_default());
        },
    }

    Ok(record)
}

/// Trim and collapse internal whitespace; empty fields become `None`.
fn clean_text(value: &str) -> Option<String> {
    let cleaned = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Parse a source date: ISO first, then the day/month/year form older files
/// use.
fn parse_date(value: &str) -> Result<NaiveDate, String> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .map_err(|_| format!("unrecognized date {:?}", value))
}

fn parse_optional_date(value: &str) -> Result<Option<NaiveDate>, String> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        parse_date(value).map(Some)
    }
}

/// Parse a decimal-comma numeric field into an exact decimal.
///
/// Accepts `1234,56`, `1.234,56` (dotted thousands), and plain `1234.56`.
/// Empty fields are `None`; anything else non-numeric is a row error, never a
/// lossy float fallback.
fn parse_decimal(value: &str) -> Result<Option<Decimal>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let normalized = if value.contains(',') {
        value.replace('.', "").replace(',', ".")
    } else {
        value.to_string()
    };

    Decimal::from_str(&normalized)
        .map(Some)
        .map_err(|_| format!("unparseable amount {:?}", value))
}
