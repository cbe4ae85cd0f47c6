// src/dataset/mod.rs

pub mod row;
pub mod timestamp;

use csv::{ReaderBuilder, StringRecord};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::info;

use crate::partition::PartitionKey;
pub use row::{Cell, Column, ColumnType, Row, COLUMNS, DATE_COLUMN};

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("required column {0} is missing from the header")]
    MissingColumn(String),

    #[error("line {line}: {source}")]
    Record {
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("line {line}: timestamp {value:?} does not match YYYY-MM-DD HH:MM")]
    Timestamp { line: u64, value: String },
}

/// The fully loaded source file. Partition keys are kept beside the rows, not
/// inside them, so they never reach the destination.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Vec<Row>,
    keys: Vec<PartitionKey>,
}

impl Dataset {
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Partition key of the row at `idx`.
    #[cfg(test)]
    pub(crate) fn key(&self, idx: usize) -> Option<PartitionKey> {
        self.keys.get(idx).copied()
    }

    /// Earliest and latest canonical timestamps.
    pub fn date_range(&self) -> Option<(&str, &str)> {
        // canonical strings sort chronologically
        let min = self.rows.iter().map(|r| r.invoice_date.as_str()).min()?;
        let max = self.rows.iter().map(|r| r.invoice_date.as_str()).max()?;
        Some((min, max))
    }

    /// Rows grouped by month, ascending by (year, month), file order within a month.
    pub fn partitions(&self) -> BTreeMap<PartitionKey, Vec<&Row>> {
        let mut groups: BTreeMap<PartitionKey, Vec<&Row>> = BTreeMap::new();
        for (row, key) in self.rows.iter().zip(&self.keys) {
            groups.entry(*key).or_default().push(row);
        }
        groups
    }
}

/// Load the whole file at `path`. Any bad row fails the load.
#[tracing::instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
pub fn load(path: impl AsRef<Path>) -> Result<Dataset, DatasetError> {
    let path = path.as_ref();
    info!("📂 Loading dataset from: {}", path.display());
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = from_reader(file)?;

    match dataset.date_range() {
        Some((first, last)) => info!(
            rows = dataset.len(),
            "✅ Dataset loaded: {} rows | Date range: {} → {}",
            dataset.len(),
            first,
            last
        ),
        None => info!("dataset is empty"),
    }
    Ok(dataset)
}

/// Parse CSV content with a header row.
pub fn from_reader<R: Read>(reader: R) -> Result<Dataset, DatasetError> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers: StringRecord = rdr.headers()?.iter().map(normalize_header).collect();
    for column in COLUMNS.iter() {
        if !headers.iter().any(|h| h == column.name) {
            return Err(DatasetError::MissingColumn(column.name.to_string()));
        }
    }

    let mut rows = Vec::new();
    let mut keys = Vec::new();
    let mut record = StringRecord::new();
    while rdr.read_record(&mut record)? {
        let line = record.position().map_or(0, |p| p.line());
        let mut row: Row = record
            .deserialize(Some(&headers))
            .map_err(|source| DatasetError::Record { line, source })?;

        let ts = timestamp::parse_input(&row.invoice_date).ok_or_else(|| {
            DatasetError::Timestamp {
                line,
                value: row.invoice_date.clone(),
            }
        })?;
        row.invoice_date = timestamp::to_canonical(&ts);
        keys.push(PartitionKey::of(&ts));
        rows.push(row);
    }

    Ok(Dataset { rows, keys })
}

/// Header names are matched upper-case, the destination's convention.
fn normalize_header(h: &str) -> String {
    h.trim_start_matches('\u{feff}').trim().to_uppercase()
}
