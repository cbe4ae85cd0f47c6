// src/error.rs

use thiserror::Error;

use crate::dataset::DatasetError;
use crate::warehouse::WarehouseError;

/// Errors that end a run. Partition write failures are not in here: they are
/// recorded on the `UploadOutcome` and the run still finishes.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Missing configuration or an unreachable destination.
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("data format error: {0}")]
    DataFormat(#[from] DatasetError),

    /// Only raised under `StatePolicy::Strict`.
    #[error("could not read existing partitions: {0}")]
    StateQuery(#[source] WarehouseError),

    #[error("could not prepare destination table: {0}")]
    Schema(#[source] WarehouseError),
}

impl SyncError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::DataFormat(_) => 2,
            SyncError::Connection(_) => 3,
            SyncError::StateQuery(_) => 4,
            SyncError::Schema(_) => 1,
        }
    }
}
