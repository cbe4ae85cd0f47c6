// src/partition/mod.rs

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use crate::dataset::Row;

/// Calendar month that is the unit of upload and of existence tracking.
/// Orders by year, then month.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    pub year: i32,
    pub month: u32,
}

impl PartitionKey {
    /// `None` unless `month` is in 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12)
            .contains(&month)
            .then_some(Self { year, month })
    }

    pub fn of(ts: &NaiveDateTime) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    /// e.g. `2020-01 (January 2020)`
    pub fn label(&self) -> String {
        match NaiveDate::from_ymd_opt(self.year, self.month, 1) {
            Some(first) => format!("{} ({})", self, first.format("%B %Y")),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Months already present at the destination.
pub type ExistingPartitions = BTreeSet<PartitionKey>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedPartition {
    pub key: PartitionKey,
    pub rows: usize,
}

#[derive(Clone, Debug)]
pub struct SelectedPartition<'a> {
    pub key: PartitionKey,
    pub rows: Vec<&'a Row>,
}

/// Result of diffing the dataset against the destination.
#[derive(Clone, Debug, Default)]
pub struct SyncPlan<'a> {
    /// Months passed over because they already exist, in iteration order.
    pub skipped: Vec<SkippedPartition>,
    /// The one month to upload this run.
    pub selected: Option<SelectedPartition<'a>>,
    /// Missing months after `selected`, left for later runs.
    pub pending: usize,
}

/// Walk months in ascending order, skip those in `existing`, and select the
/// first missing one. At most one month is selected.
pub fn select_upload<'a>(
    partitions: BTreeMap<PartitionKey, Vec<&'a Row>>,
    existing: &ExistingPartitions,
) -> SyncPlan<'a> {
    let mut plan = SyncPlan::default();
    let mut groups = partitions.into_iter();

    for (key, rows) in groups.by_ref() {
        if existing.contains(&key) {
            plan.skipped.push(SkippedPartition {
                key,
                rows: rows.len(),
            });
            continue;
        }
        plan.selected = Some(SelectedPartition { key, rows });
        break;
    }

    plan.pending = groups.filter(|(key, _)| !existing.contains(key)).count();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fixtures::dataset;

    fn key(year: i32, month: u32) -> PartitionKey {
        PartitionKey::new(year, month).unwrap()
    }

    #[test]
    fn month_must_be_in_range() {
        assert!(PartitionKey::new(2020, 0).is_none());
        assert!(PartitionKey::new(2020, 13).is_none());
        assert_eq!(key(2020, 1).to_string(), "2020-01");
        assert_eq!(key(2020, 1).label(), "2020-01 (January 2020)");
        assert!(key(2019, 12) < key(2020, 1));
    }

    #[test]
    fn skips_existing_and_uploads_next_month() {
        let ds = dataset(&[((2020, 1), 500), ((2020, 2), 300)]);
        let existing: ExistingPartitions = [key(2020, 1)].into_iter().collect();

        let plan = select_upload(ds.partitions(), &existing);

        assert_eq!(
            plan.skipped,
            vec![SkippedPartition {
                key: key(2020, 1),
                rows: 500
            }]
        );
        let selected = plan.selected.unwrap();
        assert_eq!(selected.key, key(2020, 2));
        assert_eq!(selected.rows.len(), 300);
        assert_eq!(plan.pending, 0);
    }

    #[test]
    fn only_first_missing_month_is_selected() {
        let ds = dataset(&[((2020, 3), 2), ((2020, 1), 2), ((2020, 2), 2), ((2021, 1), 1)]);

        let plan = select_upload(ds.partitions(), &ExistingPartitions::new());

        assert!(plan.skipped.is_empty());
        assert_eq!(plan.selected.unwrap().key, key(2020, 1));
        assert_eq!(plan.pending, 3);
    }

    #[test]
    fn pending_ignores_months_already_present() {
        let ds = dataset(&[((2020, 1), 1), ((2020, 2), 1), ((2020, 3), 1)]);
        let existing: ExistingPartitions = [key(2020, 3)].into_iter().collect();

        let plan = select_upload(ds.partitions(), &existing);

        assert_eq!(plan.selected.unwrap().key, key(2020, 1));
        assert_eq!(plan.pending, 1);
        // iteration stopped before reaching 2020-03
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn nothing_selected_when_everything_exists() {
        let ds = dataset(&[((2020, 1), 3), ((2020, 2), 4)]);
        let existing: ExistingPartitions = [key(2020, 1), key(2020, 2), key(2019, 7)]
            .into_iter()
            .collect();

        let plan = select_upload(ds.partitions(), &existing);

        assert!(plan.selected.is_none());
        assert_eq!(plan.skipped.len(), 2);
        assert_eq!(plan.pending, 0);
    }

    #[test]
    fn empty_dataset_selects_nothing() {
        let plan = select_upload(BTreeMap::new(), &ExistingPartitions::new());
        assert!(plan.selected.is_none());
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn selection_is_deterministic() {
        let ds = dataset(&[((2022, 6), 3), ((2021, 11), 2), ((2022, 1), 5)]);
        let existing: ExistingPartitions = [key(2021, 11)].into_iter().collect();

        let first = select_upload(ds.partitions(), &existing).selected.unwrap();
        for _ in 0..5 {
            let again = select_upload(ds.partitions(), &existing).selected.unwrap();
            assert_eq!(again.key, first.key);
            assert_eq!(again.rows, first.rows);
        }
        assert_eq!(first.key, key(2022, 1));
    }
}
