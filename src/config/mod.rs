// src/config/mod.rs

use clap::{Parser, ValueEnum};
use std::{fmt, path::PathBuf};

use crate::error::SyncError;
use crate::pipeline::{StatePolicy, SyncOptions};

/// Command-line args. Every option can also come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "salesload",
    version,
    about = "Upload the next missing month of sales data, one month per run"
)]
pub struct Args {
    /// Source CSV file
    #[arg(long, env = "SALESLOAD_CSV", default_value = "online_sales_dataset.csv")]
    pub csv: PathBuf,

    /// Destination table
    #[arg(long, env = "SALESLOAD_TABLE", default_value = "RAW_SALES")]
    pub table: String,

    /// Where rows are loaded
    #[arg(long, env = "SALESLOAD_DESTINATION", value_enum, default_value_t = DestinationKind::Snowflake)]
    pub destination: DestinationKind,

    /// Database file used with `--destination duckdb`
    #[arg(long, env = "SALESLOAD_DUCKDB_PATH", default_value = "salesload.duckdb")]
    pub duckdb_path: PathBuf,

    /// Directory for per-run log files
    #[arg(long, env = "SALESLOAD_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Abort when the existing-months query fails for any reason other than a missing table
    #[arg(long, env = "SALESLOAD_STRICT_STATE")]
    pub strict_state: bool,

    /// Report what would be uploaded without writing
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub snowflake: SnowflakeSettings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DestinationKind {
    Snowflake,
    Duckdb,
}

/// Snowflake options as given; checked by `resolve` when connecting.
#[derive(clap::Args, Clone, Default)]
pub struct SnowflakeSettings {
    #[arg(long = "snowflake-user", env = "SNOWFLAKE_USER")]
    pub user: Option<String>,

    /// Password or programmatic access token
    #[arg(long = "snowflake-password", env = "SNOWFLAKE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Account identifier, e.g. `xy12345.eu-west-1`
    #[arg(long = "snowflake-account", env = "SNOWFLAKE_ACCOUNT")]
    pub account: Option<String>,

    #[arg(long = "snowflake-warehouse", env = "SNOWFLAKE_WAREHOUSE")]
    pub warehouse: Option<String>,

    #[arg(long = "snowflake-database", env = "SNOWFLAKE_DATABASE")]
    pub database: Option<String>,

    #[arg(long = "snowflake-schema", env = "SNOWFLAKE_SCHEMA")]
    pub schema: Option<String>,

    #[arg(long = "snowflake-role", env = "SNOWFLAKE_ROLE")]
    pub role: Option<String>,

    /// Override for the account URL (private link, proxies)
    #[arg(long = "snowflake-host", env = "SNOWFLAKE_HOST")]
    pub host: Option<String>,
}

impl fmt::Debug for SnowflakeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeSettings")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("host", &self.host)
            .finish()
    }
}

/// Complete Snowflake connection settings.
#[derive(Clone)]
pub struct SnowflakeConfig {
    pub user: String,
    pub password: String,
    pub account: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub role: Option<String>,
    pub host: Option<String>,
}

impl SnowflakeConfig {
    pub fn base_url(&self) -> String {
        match &self.host {
            Some(host) if host.contains("://") => host.clone(),
            Some(host) => format!("https://{host}"),
            None => format!("https://{}.snowflakecomputing.com", self.account),
        }
    }
}

impl fmt::Debug for SnowflakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeConfig")
            .field("user", &self.user)
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl SnowflakeSettings {
    /// Fails with every missing variable named.
    pub fn resolve(&self) -> Result<SnowflakeConfig, SyncError> {
        let mut missing = Vec::new();
        let mut take = |value: &Option<String>, name: &'static str| match value {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => {
                missing.push(name);
                String::new()
            }
        };
        let user = take(&self.user, "SNOWFLAKE_USER");
        let password = take(&self.password, "SNOWFLAKE_PASSWORD");
        let account = take(&self.account, "SNOWFLAKE_ACCOUNT");
        let warehouse = take(&self.warehouse, "SNOWFLAKE_WAREHOUSE");
        let database = take(&self.database, "SNOWFLAKE_DATABASE");
        let schema = take(&self.schema, "SNOWFLAKE_SCHEMA");

        if !missing.is_empty() {
            return Err(SyncError::Connection(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        Ok(SnowflakeConfig {
            user,
            password,
            account,
            warehouse,
            database,
            schema,
            role: self.role.clone().filter(|r| !r.trim().is_empty()),
            host: self.host.clone().filter(|h| !h.trim().is_empty()),
        })
    }
}

/// Settings for one run, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub csv_path: PathBuf,
    pub table: String,
    pub destination: DestinationKind,
    pub duckdb_path: PathBuf,
    pub log_dir: PathBuf,
    pub state_policy: StatePolicy,
    pub dry_run: bool,
    pub snowflake: SnowflakeSettings,
}

impl Config {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            state_policy: self.state_policy,
            dry_run: self.dry_run,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            csv_path: args.csv,
            table: args.table,
            destination: args.destination,
            duckdb_path: args.duckdb_path,
            log_dir: args.log_dir,
            state_policy: if args.strict_state {
                StatePolicy::Strict
            } else {
                StatePolicy::Lenient
            },
            dry_run: args.dry_run,
            snowflake: args.snowflake,
        }
    }
}
