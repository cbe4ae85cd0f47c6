// src/warehouse/mod.rs

pub mod snowflake;
pub mod sql;

use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::info;

use crate::config::{Config, DestinationKind};
use crate::dataset::Row;
use crate::duck::DuckDbDestination;
use crate::error::SyncError;
use crate::partition::PartitionKey;
use snowflake::SnowflakeConnection;

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Snowflake returned {status} (code {code}, SQLSTATE {sql_state}): {message}")]
    Api {
        status: u16,
        code: String,
        sql_state: String,
        message: String,
    },

    #[error("DuckDB: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("{0:?} is not a plain SQL identifier")]
    Identifier(String),
}

impl WarehouseError {
    /// True when the failure means the target table has not been created yet.
    pub fn is_missing_table(&self) -> bool {
        match self {
            // 002003: object does not exist or not authorized
            WarehouseError::Api { code, sql_state, .. } => code == "002003" || sql_state == "42S02",
            WarehouseError::DuckDb(e) => {
                let msg = e.to_string();
                msg.contains("Table with name") && msg.contains("does not exist")
            }
            _ => false,
        }
    }
}

/// A table that rows are loaded into and that records which months it holds.
/// Implementations release their connection when dropped.
#[async_trait(?Send)]
pub trait Destination {
    /// Where rows go, for logs.
    fn describe(&self) -> String;

    /// `CREATE TABLE IF NOT EXISTS` with the fixed column set.
    async fn ensure_table(&mut self) -> Result<(), WarehouseError>;

    /// Distinct (year, month) pairs already stored.
    async fn existing_partitions(&mut self) -> Result<BTreeSet<PartitionKey>, WarehouseError>;

    /// Write `rows` as one unit and return the number of rows written.
    async fn write_rows(&mut self, rows: &[&Row]) -> Result<u64, WarehouseError>;
}

/// Open the destination named by `config`.
pub async fn open_destination(config: &Config) -> Result<Box<dyn Destination>, SyncError> {
    match config.destination {
        DestinationKind::Snowflake => {
            let settings = config.snowflake.resolve()?;
            let conn = SnowflakeConnection::connect(&settings, &config.table).await?;
            Ok(Box::new(conn))
        }
        DestinationKind::Duckdb => {
            info!("Opening DuckDB database {}", config.duckdb_path.display());
            let db = DuckDbDestination::open(&config.duckdb_path, &config.table)
                .map_err(|e| SyncError::Connection(e.to_string()))?;
            Ok(Box::new(db))
        }
    }
}

/// Decode a `(year, month)` pair read back from the destination.
pub(crate) fn partition_key(year: i64, month: i64) -> Result<PartitionKey, WarehouseError> {
    i32::try_from(year)
        .ok()
        .zip(u32::try_from(month).ok())
        .and_then(|(y, m)| PartitionKey::new(y, m))
        .ok_or_else(|| WarehouseError::Decode(format!("invalid partition ({year}, {month})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_table_detection() {
        let api = |code: &str, state: &str| WarehouseError::Api {
            status: 422,
            code: code.into(),
            sql_state: state.into(),
            message: "SQL compilation error".into(),
        };
        assert!(api("002003", "02000").is_missing_table());
        assert!(api("000000", "42S02").is_missing_table());
        assert!(!api("390100", "08001").is_missing_table());
        assert!(!WarehouseError::Decode("x".into()).is_missing_table());
    }

    #[test]
    fn partition_keys_are_range_checked() {
        assert_eq!(partition_key(2020, 7).unwrap(), PartitionKey::new(2020, 7).unwrap());
        assert!(partition_key(2020, 0).is_err());
        assert!(partition_key(2020, 13).is_err());
        assert!(partition_key(i64::MAX, 1).is_err());
    }
}
