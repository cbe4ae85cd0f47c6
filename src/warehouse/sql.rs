use once_cell::sync::Lazy;
use regex::Regex;

use crate::dataset::{ColumnType, COLUMNS, DATE_COLUMN};
use crate::warehouse::WarehouseError;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("identifier pattern is valid"));

/// SQL dialect of a destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Snowflake,
    DuckDb,
}

impl Dialect {
    fn column_type(self, kind: ColumnType) -> &'static str {
        match (self, kind) {
            (_, ColumnType::Text) => "VARCHAR",
            (Dialect::Snowflake, ColumnType::Integer) => "NUMBER",
            (Dialect::Snowflake, ColumnType::Float) => "FLOAT",
            (Dialect::DuckDb, ColumnType::Integer) => "BIGINT",
            (Dialect::DuckDb, ColumnType::Float) => "DOUBLE",
        }
    }
}

/// Table names are spliced into statements, so only plain identifiers pass.
pub fn validate_identifier(name: &str) -> Result<&str, WarehouseError> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(WarehouseError::Identifier(name.to_string()))
    }
}

pub fn create_table(dialect: Dialect, table: &str) -> String {
    let columns = COLUMNS
        .iter()
        .map(|c| format!("    {} {}", c.name, dialect.column_type(c.kind)))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("CREATE TABLE IF NOT EXISTS {table} (\n{columns}\n)")
}

/// Distinct (year, month) pairs, parsed from the stored canonical timestamp.
pub fn existing_partitions(dialect: Dialect, table: &str) -> String {
    let ts = match dialect {
        Dialect::Snowflake => format!("TO_TIMESTAMP({DATE_COLUMN}, 'YYYY-MM-DD HH24:MI:SS')"),
        Dialect::DuckDb => format!("strptime({DATE_COLUMN}, '%Y-%m-%d %H:%M:%S')"),
    };
    format!(
        "SELECT DISTINCT YEAR({ts}) AS YR, MONTH({ts}) AS MN \
         FROM {table} WHERE {DATE_COLUMN} IS NOT NULL ORDER BY YR, MN"
    )
}

/// Single-row positional insert over every column.
pub fn insert(table: &str) -> String {
    let names = COLUMNS.iter().map(|c| c.name).collect::<Vec<_>>().join(", ");
    let marks = vec!["?"; COLUMNS.len()].join(", ");
    format!("INSERT INTO {table} ({names}) VALUES ({marks})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(validate_identifier("RAW_SALES").is_ok());
        assert!(validate_identifier("_t$1").is_ok());
        for bad in ["", "1abc", "raw sales", "x;DROP TABLE y", "db.table", "\"q\""] {
            assert!(validate_identifier(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn ddl_lists_every_column() {
        let ddl = create_table(Dialect::Snowflake, "RAW_SALES");
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS RAW_SALES ("));
        assert!(ddl.contains("QUANTITY NUMBER"));
        assert!(ddl.contains("INVOICEDATE VARCHAR"));
        assert!(ddl.contains("CUSTOMERID FLOAT"));
        assert_eq!(ddl.matches(',').count(), COLUMNS.len() - 1);

        let duck = create_table(Dialect::DuckDb, "RAW_SALES");
        assert!(duck.contains("QUANTITY BIGINT"));
        assert!(duck.contains("SHIPPINGCOST DOUBLE"));
    }

    #[test]
    fn state_query_uses_canonical_format() {
        let q = existing_partitions(Dialect::Snowflake, "RAW_SALES");
        assert!(q.contains("'YYYY-MM-DD HH24:MI:SS'"));
        assert!(q.contains("FROM RAW_SALES"));
        let q = existing_partitions(Dialect::DuckDb, "RAW_SALES");
        assert!(q.contains("'%Y-%m-%d %H:%M:%S'"));
    }

    #[test]
    fn insert_has_one_marker_per_column() {
        let q = insert("RAW_SALES");
        assert_eq!(q.matches('?').count(), 17);
        assert!(q.starts_with("INSERT INTO RAW_SALES (INVOICENO, STOCKCODE"));
    }
}
