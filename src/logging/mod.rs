// src/logging/mod.rs

use anyhow::{Context, Result};
use chrono::Local;
use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps the run's subscriber active; logging stops when this is dropped.
pub struct LogGuard {
    _default: DefaultGuard,
    file: PathBuf,
}

impl LogGuard {
    /// Log file written for this run.
    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// Console + per-run file logging, scoped to the returned guard.
///
/// The filter comes from `RUST_LOG`, falling back to `info`. The file is
/// `<log_dir>/salesload_<YYYYmmdd_HHMMSS>.log`.
pub fn init(log_dir: &Path) -> Result<LogGuard> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let path = log_dir.join(format!(
        "salesload_{}.log",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    let file = open_run_log(&path)?;

    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(env)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        );

    Ok(LogGuard {
        _default: tracing::subscriber::set_default(subscriber),
        file: path,
    })
}

/// Opened for append: runs started within the same second share one file.
fn open_run_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}
