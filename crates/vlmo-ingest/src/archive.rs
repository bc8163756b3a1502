//! Archive extraction
//!
//! Opens a fetched blob as an in-memory ZIP archive and yields its tabular
//! entries as [`RawPayload`]s with their declared encoding. Failures here are
//! scoped to the one resource being extracted; the run continues with the
//! remaining resources.

use std::io::{Cursor, Read};
use thiserror::Error;
use tracing::debug;
use vlmo_common::types::DatasetKind;

use crate::models::{DatasetResource, RawPayload, SourceEncoding};

/// Extraction failure for a single resource
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("not a valid zip archive: {0}")]
    Corrupt(#[from] zip::result::ZipError),

    #[error("archive contains no tabular entries")]
    NoTables,

    #[error("failed to read archive entry {name}: {source}")]
    Entry {
        name: String,
        source: std::io::Error,
    },
}

/// Extract the CSV payloads of one fetched archive.
///
/// Entry kind is detected from the `_con_` filename marker the source uses
/// for consolidated files. When the resource restricts the kind, entries of
/// the other kind are skipped without error.
pub fn extract(resource: &DatasetResource, data: &[u8]) -> Result<Vec<RawPayload>, ArchiveError> {
    let cursor = Cursor::new(data);
    let mut archive = zip::ZipArchive::new(cursor)?;

    let mut payloads = Vec::new();
    let mut saw_tabular = false;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }

        let path = entry.name().to_string();
        let file_name = path.rsplit('/').next().unwrap_or(&path).to_string();
        if !file_name.to_lowercase().ends_with(".csv") {
            debug!(entry = %file_name, "Skipping non-tabular archive entry");
            continue;
        }
        saw_tabular = true;

        let kind = detect_kind(&file_name);
        if let Some(filter) = resource.kind {
            if filter != kind {
                continue;
            }
        }

        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|source| ArchiveError::Entry {
                name: file_name.clone(),
                source,
            })?;

        debug!(
            entry = %file_name,
            kind = %kind,
            bytes = bytes.len(),
            "Extracted archive entry"
        );

        payloads.push(RawPayload {
            file_name,
            kind,
            encoding: SourceEncoding::Latin1,
            version: resource.version.clone(),
            bytes,
        });
    }

    if !saw_tabular {
        return Err(ArchiveError::NoTables);
    }

    Ok(payloads)
}

fn detect_kind(file_name: &str) -> DatasetKind {
    if file_name.to_lowercase().contains("_con_") {
        DatasetKind::Consolidated
    } else {
        DatasetKind::Individual
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use url::Url;
    use vlmo_common::types::VersionLabel;
    use zip::write::FileOptions;

    fn resource(kind: Option<DatasetKind>) -> DatasetResource {
        DatasetResource {
            url: Url::parse("https://example.com/vlmo_cia_aberta_2023.zip").unwrap(),
            file_name: "vlmo_cia_aberta_2023.zip".to_string(),
            version: VersionLabel::parse("2023").unwrap(),
            kind,
        }
    }

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer
                .start_file(*name, FileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extract_routes_kinds() {
        let data = build_zip(&[
            ("vlmo_cia_aberta_con_2023.csv", b"a;b\n1;2\n"),
            ("vlmo_cia_aberta_2023.csv", b"c;d\n3;4\n"),
            ("meta.txt", b"ignored"),
        ]);

        let payloads = extract(&resource(None), &data).unwrap();
        assert_eq!(payloads.len(), 2);

        let consolidated = payloads
            .iter()
            .find(|p| p.kind == DatasetKind::Consolidated)
            .unwrap();
        assert_eq!(consolidated.file_name, "vlmo_cia_aberta_con_2023.csv");
        assert_eq!(consolidated.encoding, SourceEncoding::Latin1);
        assert_eq!(consolidated.version, VersionLabel::parse("2023").unwrap());

        assert!(payloads.iter().any(|p| p.kind == DatasetKind::Individual));
    }

    #[test]
    fn test_extract_applies_kind_filter() {
        let data = build_zip(&[
            ("vlmo_cia_aberta_con_2023.csv", b"a;b\n1;2\n"),
            ("vlmo_cia_aberta_2023.csv", b"c;d\n3;4\n"),
        ]);

        let payloads = extract(&resource(Some(DatasetKind::Individual)), &data).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].kind, DatasetKind::Individual);
    }

    #[test]
    fn test_extract_filtered_to_nothing_is_not_an_error() {
        let data = build_zip(&[("vlmo_cia_aberta_con_2023.csv", b"a;b\n1;2\n")]);

        let payloads = extract(&resource(Some(DatasetKind::Individual)), &data).unwrap();
        assert!(payloads.is_empty());
    }

    #[test]
    fn test_extract_rejects_corrupt_blob() {
        let result = extract(&resource(None), b"definitely not a zip");
        assert!(matches!(result, Err(ArchiveError::Corrupt(_))));
    }

    #[test]
    fn test_extract_rejects_archive_without_tables() {
        let data = build_zip(&[("readme.txt", b"no tables here")]);
        let result = extract(&resource(None), &data);
        assert!(matches!(result, Err(ArchiveError::NoTables)));
    }
}
