use async_trait::async_trait;
use duckdb::types::{ToSql, ToSqlOutput};
use duckdb::Connection;
use std::{collections::BTreeSet, path::Path};
use tracing::info;

use crate::dataset::{Cell, Row};
use crate::partition::PartitionKey;
use crate::warehouse::{partition_key, sql, Destination, WarehouseError};

/// Open a DuckDB database on disk at `path`, creating the file if it doesn't exist.
pub fn open_disk_db(path: &Path) -> Result<Connection, WarehouseError> {
    let conn = Connection::open(path)?;
    Ok(conn)
}

/// Open a DuckDB in‐memory database
pub fn open_mem_db() -> Result<Connection, WarehouseError> {
    let conn = Connection::open_in_memory()?;
    Ok(conn)
}

impl ToSql for Cell<'_> {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        match self {
            Cell::Text(v) => v.to_sql(),
            Cell::Integer(v) => v.to_sql(),
            Cell::Float(v) => v.to_sql(),
        }
    }
}

/// Sales table in an embedded DuckDB database.
pub struct DuckDbDestination {
    conn: Connection,
    table: String,
    location: String,
}

impl DuckDbDestination {
    pub fn open(path: &Path, table: &str) -> Result<Self, WarehouseError> {
        Self::new(open_disk_db(path)?, table, path.display().to_string())
    }

    pub fn open_in_memory(table: &str) -> Result<Self, WarehouseError> {
        Self::new(open_mem_db()?, table, ":memory:".to_string())
    }

    fn new(conn: Connection, table: &str, location: String) -> Result<Self, WarehouseError> {
        let table = sql::validate_identifier(table)?.to_string();
        Ok(Self {
            conn,
            table,
            location,
        })
    }

    /// Number of rows currently stored.
    #[cfg(test)]
    pub(crate) fn row_count(&self) -> Result<u64, WarehouseError> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |r| {
                r.get(0)
            })?;
        Ok(n as u64)
    }
}

#[async_trait(?Send)]
impl Destination for DuckDbDestination {
    fn describe(&self) -> String {
        format!("duckdb://{}/{}", self.location, self.table)
    }

    async fn ensure_table(&mut self) -> Result<(), WarehouseError> {
        self.conn
            .execute_batch(&sql::create_table(sql::Dialect::DuckDb, &self.table))?;
        info!("✅ Table '{}' ready.", self.table);
        Ok(())
    }

    async fn existing_partitions(&mut self) -> Result<BTreeSet<PartitionKey>, WarehouseError> {
        let q = sql::existing_partitions(sql::Dialect::DuckDb, &self.table);
        let mut stmt = self.conn.prepare(&q)?;
        let pairs = stmt
            .query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        pairs
            .into_iter()
            .map(|(year, month)| partition_key(year, month))
            .collect()
    }

    /// Appends inside one transaction, so a failed partition leaves nothing behind.
    async fn write_rows(&mut self, rows: &[&Row]) -> Result<u64, WarehouseError> {
        let tx = self.conn.transaction()?;
        {
            let mut appender = tx.appender(&self.table)?;
            for row in rows {
                let cells = row.cells();
                let params: Vec<&dyn ToSql> = cells.iter().map(|c| c as &dyn ToSql).collect();
                appender.append_row(params.as_slice())?;
            }
            appender.flush()?;
        }
        tx.commit()?;
        Ok(rows.len() as u64)
    }
}

impl Drop for DuckDbDestination {
    fn drop(&mut self) {
        info!("🔒 DuckDB connection closed ({}).", self.location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fixtures::dataset;
    use anyhow::Result;
    use tempfile::tempdir;

    fn key(year: i32, month: u32) -> PartitionKey {
        PartitionKey::new(year, month).unwrap()
    }

    #[tokio::test]
    async fn ensure_table_is_idempotent() -> Result<()> {
        let mut db = DuckDbDestination::open_in_memory("RAW_SALES")?;
        db.ensure_table().await?;
        db.ensure_table().await?;
        assert!(db.existing_partitions().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn written_rows_show_up_as_partitions() -> Result<()> {
        let ds = dataset(&[((2020, 1), 4), ((2020, 2), 2)]);
        let parts = ds.partitions();
        let mut db = DuckDbDestination::open_in_memory("RAW_SALES")?;
        db.ensure_table().await?;

        let written = db.write_rows(&parts[&key(2020, 2)]).await?;
        assert_eq!(written, 2);
        assert_eq!(db.row_count()?, 2);
        assert_eq!(
            db.existing_partitions().await?,
            [key(2020, 2)].into_iter().collect()
        );

        // values land in the right columns
        let (qty, date, customer): (i64, String, Option<f64>) = db.conn.query_row(
            "SELECT QUANTITY, INVOICEDATE, CUSTOMERID FROM RAW_SALES LIMIT 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;
        assert_eq!(qty, 38);
        assert_eq!(date, "2020-02-01 10:30:00");
        assert_eq!(customer, Some(37039.0));
        Ok(())
    }

    #[tokio::test]
    async fn missing_table_is_recognised() -> Result<()> {
        let mut db = DuckDbDestination::open_in_memory("RAW_SALES")?;
        let err = db.existing_partitions().await.unwrap_err();
        assert!(err.is_missing_table(), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn failed_write_leaves_no_rows() -> Result<()> {
        let ds = dataset(&[((2021, 5), 3)]);
        let rows: Vec<&Row> = ds.rows().iter().collect();
        let mut db = DuckDbDestination::open_in_memory("RAW_SALES")?;

        // the uploader never creates the table itself
        assert!(db.write_rows(&rows).await.is_err());
        db.ensure_table().await?;
        assert_eq!(db.row_count()?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn disk_database_persists_between_opens() -> Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("sales.duckdb");
        let ds = dataset(&[((2019, 11), 5)]);
        let rows: Vec<&Row> = ds.rows().iter().collect();

        {
            let mut db = DuckDbDestination::open(&path, "RAW_SALES")?;
            db.ensure_table().await?;
            db.write_rows(&rows).await?;
        }

        let mut db = DuckDbDestination::open(&path, "RAW_SALES")?;
        assert_eq!(
            db.existing_partitions().await?,
            [key(2019, 11)].into_iter().collect()
        );
        assert!(db.describe().ends_with("/RAW_SALES"));

        let mem = DuckDbDestination::open_in_memory("RAW_SALES")?;
        assert_eq!(mem.describe(), "duckdb://:memory:/RAW_SALES");
        Ok(())
    }

    #[test]
    fn rejects_unsafe_table_names() {
        assert!(matches!(
            DuckDbDestination::open_in_memory("sales; DROP TABLE x"),
            Err(WarehouseError::Identifier(_))
        ));
    }
}
