//! Merge engine
//!
//! Combines freshly normalized records with the existing dataset. Conflicts
//! on a natural key resolve by source-version recency: an equal-or-newer
//! incoming record replaces the stored one, an older one is discarded. A
//! byte-identical record at the same version counts as a duplicate, which is
//! what makes re-merging a batch a no-op.

use serde::Serialize;
use std::cmp::Ordering;
use tracing::info;

use crate::dataset::Dataset;
use crate::models::Record;

/// Counters returned by one merge pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Keys not present before this pass
    pub new: usize,
    /// Keys replaced by an equal-or-newer source version
    pub updated: usize,
    /// Incoming records discarded as stale or identical
    pub duplicate: usize,
    /// Dataset size after the pass
    pub total: usize,
}

/// Merge incoming records into the dataset, returning the pass counters.
///
/// The outcome depends only on natural keys and version recency, never on
/// the order records arrive in (fetch completion order is nondeterministic).
pub fn merge(dataset: &mut Dataset, incoming: impl IntoIterator<Item = Record>) -> MergeStats {
    let mut stats = MergeStats::default();

    for record in incoming {
        let key = record.natural_key();
        match dataset.get(&key) {
            None => {
                dataset.insert(record);
                stats.new += 1;
            },
            Some(existing) => match record.source_version.cmp(&existing.source_version) {
                Ordering::Less => stats.duplicate += 1,
                Ordering::Greater => {
                    dataset.insert(record);
                    stats.updated += 1;
                },
                Ordering::Equal => {
                    if *existing == record {
                        stats.duplicate += 1;
                    } else {
                        dataset.insert(record);
                        stats.updated += 1;
                    }
                },
            },
        }
    }

    stats.total = dataset.len();
    info!(
        kind = %dataset.kind(),
        new = stats.new,
        updated = stats.updated,
        duplicate = stats.duplicate,
        total = stats.total,
        "Merge pass complete"
    );
    stats
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use vlmo_common::types::{DatasetKind, VersionLabel};

    fn record(cnpj: &str, day: u32, version: &str, volume: &str) -> Record {
        Record {
            company_cnpj: cnpj.to_string(),
            company_name: "ACME S.A.".to_string(),
            reference_date: NaiveDate::from_ymd_opt(2023, 6, 30).unwrap(),
            filing_version: Some(1),
            movement_date: NaiveDate::from_ymd_opt(2023, 6, day),
            movement_type: Some("Compra".to_string()),
            operation_type: None,
            asset_type: None,
            position_type: None,
            intermediary: None,
            quantity: None,
            unit_price: None,
            volume: Some(Decimal::from_str(volume).unwrap()),
            cvm_code: None,
            category: None,
            doc_type: None,
            delivery_date: None,
            presentation_type: None,
            delivery_protocol: None,
            kind: DatasetKind::Consolidated,
            source_version: VersionLabel::parse(version).unwrap(),
        }
    }

    #[test]
    fn test_merge_counts_new_records() {
        let mut dataset = Dataset::new(DatasetKind::Consolidated);
        let stats = merge(
            &mut dataset,
            vec![
                record("1", 1, "2023", "10.00"),
                record("2", 1, "2023", "20.00"),
            ],
        );

        assert_eq!(stats.new, 2);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.duplicate, 0);
        assert_eq!(stats.total, 2);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let batch = vec![
            record("1", 1, "2023", "10.00"),
            record("2", 1, "2023", "20.00"),
            record("3", 1, "2023", "30.00"),
        ];

        let mut dataset = Dataset::new(DatasetKind::Consolidated);
        merge(&mut dataset, batch.clone());
        let snapshot: Vec<_> = dataset.records().cloned().collect();

        let second = merge(&mut dataset, batch);
        assert_eq!(second.new, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.duplicate, 3);
        assert_eq!(second.total, 3);

        let after: Vec<_> = dataset.records().cloned().collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let records = vec![
            record("1", 1, "2022", "10.00"),
            record("1", 1, "2024", "30.00"),
            record("1", 1, "2023", "20.00"),
            record("2", 5, "2023", "40.00"),
        ];

        let permutations: [[usize; 4]; 6] = [
            [0, 1, 2, 3],
            [3, 2, 1, 0],
            [1, 0, 3, 2],
            [2, 3, 0, 1],
            [0, 2, 3, 1],
            [1, 3, 0, 2],
        ];

        let mut reference: Option<Vec<Record>> = None;
        for permutation in permutations {
            let batch: Vec<_> = permutation.iter().map(|&i| records[i].clone()).collect();
            let mut dataset = Dataset::new(DatasetKind::Consolidated);
            merge(&mut dataset, batch);

            let result: Vec<_> = dataset.records().cloned().collect();
            match &reference {
                None => reference = Some(result),
                Some(expected) => assert_eq!(expected, &result),
            }
        }

        let winner = reference.unwrap();
        assert_eq!(winner.len(), 2);
        assert!(winner
            .iter()
            .any(|r| r.source_version == VersionLabel::parse("2024").unwrap()));
    }

    #[test]
    fn test_stale_version_is_discarded() {
        let mut dataset = Dataset::new(DatasetKind::Consolidated);
        merge(&mut dataset, vec![record("1", 1, "2023", "10.00")]);

        let stats = merge(&mut dataset, vec![record("1", 1, "2022", "99.00")]);
        assert_eq!(stats.duplicate, 1);
        assert_eq!(stats.updated, 0);

        let kept = dataset.records().next().unwrap();
        assert_eq!(kept.source_version, VersionLabel::parse("2023").unwrap());
        assert_eq!(kept.volume, Some(Decimal::from_str("10.00").unwrap()));
    }

    #[test]
    fn test_newer_version_replaces() {
        let mut dataset = Dataset::new(DatasetKind::Consolidated);
        merge(&mut dataset, vec![record("1", 1, "2023", "10.00")]);

        let stats = merge(&mut dataset, vec![record("1", 1, "2024", "42.00")]);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.total, 1);

        let kept = dataset.records().next().unwrap();
        assert_eq!(kept.volume, Some(Decimal::from_str("42.00").unwrap()));
    }

    #[test]
    fn test_equal_version_revision_replaces() {
        let mut dataset = Dataset::new(DatasetKind::Consolidated);
        merge(&mut dataset, vec![record("1", 1, "2023", "10.00")]);

        // same key and version but revised content: the revision wins
        let stats = merge(&mut dataset, vec![record("1", 1, "2023", "11.00")]);
        assert_eq!(stats.updated, 1);

        let kept = dataset.records().next().unwrap();
        assert_eq!(kept.volume, Some(Decimal::from_str("11.00").unwrap()));
    }

    #[test]
    fn test_no_two_records_share_a_key() {
        let mut dataset = Dataset::new(DatasetKind::Consolidated);
        let batch: Vec<_> = (0..20)
            .map(|i| record(&format!("{}", i % 5), (i % 3) + 1, "2023", "1.00"))
            .collect();
        merge(&mut dataset, batch);

        let mut keys: Vec<_> = dataset.records().map(|r| r.natural_key()).collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(before, keys.len());
        assert_eq!(dataset.len(), before);
    }
}
