// src/warehouse/snowflake.rs
//
// Destination backed by the Snowflake SQL REST API (`/api/v2/statements`).

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client, Response, StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{collections::BTreeSet, time::Duration};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use super::{partition_key, sql, Destination, WarehouseError};
use crate::config::SnowflakeConfig;
use crate::dataset::{ColumnType, Row, COLUMNS};
use crate::error::SyncError;
use crate::partition::PartitionKey;

const STATEMENTS_PATH: &str = "api/v2/statements";
const TOKEN_TYPE_HEADER: &str = "X-Snowflake-Authorization-Token-Type";
const TOKEN_TYPE: &str = "PROGRAMMATIC_ACCESS_TOKEN";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    warehouse: &'a str,
    database: &'a str,
    schema: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bindings: Option<Map<String, Value>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    sql_state: Option<String>,
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
    #[serde(default)]
    stats: Option<Stats>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    num_rows: u64,
    #[serde(default)]
    partition_info: Vec<Value>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct Stats {
    #[serde(default)]
    num_rows_inserted: Option<u64>,
}

/// Outcome of one HTTP exchange with the statements endpoint.
#[derive(Debug)]
enum Reply {
    Done(StatementResponse),
    /// 202: still executing, poll the handle.
    Running(String),
}

/// An open Snowflake session for one table.
pub struct SnowflakeConnection {
    client: Client,
    statements_url: Url,
    warehouse: String,
    database: String,
    schema: String,
    role: Option<String>,
    table: String,
    account: String,
}

impl SnowflakeConnection {
    /// Build the client and check the credentials with a probe query.
    pub async fn connect(config: &SnowflakeConfig, table: &str) -> Result<Self, SyncError> {
        let table = sql::validate_identifier(table)
            .map_err(|e| SyncError::Connection(e.to_string()))?
            .to_string();
        info!(account = %config.account, user = %config.user, "Connecting to Snowflake...");

        let conn = Self::new(config, table).map_err(|e| SyncError::Connection(e.to_string()))?;
        let version = conn
            .query_rows("SELECT CURRENT_VERSION()")
            .await
            .map_err(|e| SyncError::Connection(e.to_string()))?;
        let version = version
            .first()
            .and_then(|r| r.first().cloned().flatten())
            .unwrap_or_default();
        info!(version = %version, "✅ Connected successfully!");
        Ok(conn)
    }

    fn new(config: &SnowflakeConfig, table: String) -> Result<Self, WarehouseError> {
        let base = Url::parse(&config.base_url())
            .map_err(|e| WarehouseError::Decode(format!("invalid account URL: {e}")))?;
        let statements_url = base
            .join(STATEMENTS_PATH)
            .map_err(|e| WarehouseError::Decode(format!("invalid account URL: {e}")))?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.password))
            .map_err(|_| WarehouseError::Decode("secret is not a valid header value".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(TOKEN_TYPE_HEADER, HeaderValue::from_static(TOKEN_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("salesload/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            statements_url,
            warehouse: config.warehouse.clone(),
            database: config.database.clone(),
            schema: config.schema.clone(),
            role: config.role.clone(),
            table,
            account: config.account.clone(),
        })
    }

    /// Submit one statement and wait for it to finish.
    async fn execute(
        &self,
        statement: &str,
        bindings: Option<Map<String, Value>>,
    ) -> Result<StatementResponse, WarehouseError> {
        let body = StatementRequest {
            statement,
            warehouse: &self.warehouse,
            database: &self.database,
            schema: &self.schema,
            role: self.role.as_deref(),
            bindings,
        };
        debug!(statement, "submitting statement");
        let resp = self
            .client
            .post(self.statements_url.clone())
            .json(&body)
            .send()
            .await?;

        let mut reply = decode(resp).await?;
        loop {
            match reply {
                Reply::Done(done) => return Ok(done),
                Reply::Running(handle) => {
                    debug!(handle = %handle, "statement still running");
                    sleep(POLL_INTERVAL).await;
                    let resp = self.client.get(self.handle_url(&handle, None)).send().await?;
                    reply = decode(resp).await?;
                }
            }
        }
    }

    fn handle_url(&self, handle: &str, partition: Option<usize>) -> Url {
        let mut url = self.statements_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(handle);
        }
        if let Some(p) = partition {
            url.query_pairs_mut().append_pair("partition", &p.to_string());
        }
        url
    }

    /// Run a query and collect every result partition.
    async fn query_rows(&self, statement: &str) -> Result<Vec<Vec<Option<String>>>, WarehouseError> {
        let first = self.execute(statement, None).await?;
        let (num_rows, partitions) = first
            .result_set_meta_data
            .as_ref()
            .map_or((0, 0), |m| (m.num_rows, m.partition_info.len()));
        debug!(num_rows, partitions, "result set");
        let mut rows = first.data;

        if partitions > 1 {
            let handle = first.statement_handle.ok_or_else(|| {
                WarehouseError::Decode("partitioned result without statementHandle".into())
            })?;
            for p in 1..partitions {
                let resp = self
                    .client
                    .get(self.handle_url(&handle, Some(p)))
                    .send()
                    .await?;
                match decode(resp).await? {
                    Reply::Done(part) => rows.extend(part.data),
                    Reply::Running(_) => {
                        return Err(WarehouseError::Decode(format!(
                            "result partition {p} reported as still running"
                        )))
                    }
                }
            }
        }
        Ok(rows)
    }
}

/// Map an HTTP response onto `Reply`, turning error bodies into `WarehouseError::Api`.
async fn decode(resp: Response) -> Result<Reply, WarehouseError> {
    let status = resp.status();
    let text = resp.text().await?;
    let parsed: StatementResponse = if text.trim().is_empty() {
        StatementResponse::default()
    } else {
        serde_json::from_str(&text)
            .map_err(|e| WarehouseError::Decode(format!("{status}: {e}: {text}")))?
    };
    classify(status, parsed)
}

fn classify(status: StatusCode, parsed: StatementResponse) -> Result<Reply, WarehouseError> {
    match status {
        StatusCode::OK => Ok(Reply::Done(parsed)),
        StatusCode::ACCEPTED => parsed
            .statement_handle
            .map(Reply::Running)
            .ok_or_else(|| WarehouseError::Decode("202 without statementHandle".into())),
        _ => Err(WarehouseError::Api {
            status: status.as_u16(),
            code: parsed.code.unwrap_or_default(),
            sql_state: parsed.sql_state.unwrap_or_default(),
            message: parsed
                .message
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string()),
        }),
    }
}

/// Column-wise array bindings for a multi-row insert: `{"1": {"type", "value": [..]}, ..}`.
fn bindings_for(rows: &[&Row]) -> Map<String, Value> {
    let cells: Vec<_> = rows.iter().map(|r| r.cells()).collect();
    COLUMNS
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let kind = match column.kind {
                ColumnType::Text => "TEXT",
                ColumnType::Integer => "FIXED",
                ColumnType::Float => "REAL",
            };
            let values: Vec<Value> = cells
                .iter()
                .map(|row| row[i].render().map_or(Value::Null, Value::String))
                .collect();
            ((i + 1).to_string(), json!({ "type": kind, "value": values }))
        })
        .collect()
}

#[async_trait(?Send)]
impl Destination for SnowflakeConnection {
    fn describe(&self) -> String {
        format!(
            "snowflake://{}/{}.{}.{}",
            self.account, self.database, self.schema, self.table
        )
    }

    async fn ensure_table(&mut self) -> Result<(), WarehouseError> {
        let ddl = sql::create_table(sql::Dialect::Snowflake, &self.table);
        self.execute(&ddl, None).await?;
        info!("✅ Table '{}' ready.", self.table);
        Ok(())
    }

    async fn existing_partitions(&mut self) -> Result<BTreeSet<PartitionKey>, WarehouseError> {
        let q = sql::existing_partitions(sql::Dialect::Snowflake, &self.table);
        let rows = self.query_rows(&q).await?;
        rows.iter().map(|r| parse_pair(r)).collect()
    }

    async fn write_rows(&mut self, rows: &[&Row]) -> Result<u64, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let insert = sql::insert(&self.table);
        let resp = self.execute(&insert, Some(bindings_for(rows))).await?;
        Ok(confirmed_rows(&resp, rows.len()))
    }
}

impl Drop for SnowflakeConnection {
    fn drop(&mut self) {
        info!("🔒 Snowflake connection closed.");
    }
}

fn parse_pair(row: &[Option<String>]) -> Result<PartitionKey, WarehouseError> {
    let field = |i: usize| -> Result<i64, WarehouseError> {
        row.get(i)
            .and_then(|v| v.as_deref())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| WarehouseError::Decode(format!("bad partition row {row:?}")))
    };
    partition_key(field(0)?, field(1)?)
}

fn inserted_count(resp: &StatementResponse) -> Option<u64> {
    resp.stats
        .as_ref()
        .and_then(|s| s.num_rows_inserted)
        .or_else(|| {
            resp.data
                .first()
                .and_then(|r| r.first().cloned().flatten())
                .and_then(|v| v.parse().ok())
        })
}

/// Row count for the DONE line. Falls back to `sent`, with a warning, when the
/// response does not say how many rows went in.
fn confirmed_rows(resp: &StatementResponse, sent: usize) -> u64 {
    match inserted_count(resp) {
        Some(inserted) => {
            if inserted != sent as u64 {
                warn!(sent, inserted, "warehouse inserted a different number of rows than sent");
            }
            inserted
        }
        None => {
            warn!(sent, "insert response has no row count; reporting rows sent");
            sent as u64
        }
    }
}
