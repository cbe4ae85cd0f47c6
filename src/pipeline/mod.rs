// src/pipeline/mod.rs

use tracing::{error, info, warn};

use crate::config::Config;
use crate::dataset::{self, Dataset};
use crate::error::SyncError;
use crate::partition::{select_upload, ExistingPartitions, PartitionKey};
use crate::warehouse::{self, Destination};

/// What to do when the existing-months query fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatePolicy {
    /// Any failure is logged and read as "nothing loaded yet".
    #[default]
    Lenient,
    /// Only a missing table reads as empty; other failures abort the run.
    Strict,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SyncOptions {
    pub state_policy: StatePolicy,
    pub dry_run: bool,
}

/// What happened to the month chosen this run.
#[derive(Clone, Debug, PartialEq)]
pub enum Upload {
    /// Every month in the dataset is already at the destination.
    Nothing,
    Uploaded { key: PartitionKey, rows: u64 },
    Failed { key: PartitionKey, rows: usize, error: String },
    /// Dry run: would have uploaded.
    Planned { key: PartitionKey, rows: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct UploadOutcome {
    pub upload: Upload,
    /// Months skipped because they already exist.
    pub skipped: usize,
    /// Missing months left for later runs.
    pub pending: usize,
}

impl UploadOutcome {
    pub fn uploaded_count(&self) -> usize {
        usize::from(matches!(self.upload, Upload::Uploaded { .. }))
    }
}

/// Read the months already loaded, applying `policy` to failures.
pub async fn read_existing(
    dest: &mut dyn Destination,
    policy: StatePolicy,
) -> Result<ExistingPartitions, SyncError> {
    match dest.existing_partitions().await {
        Ok(existing) => {
            if existing.is_empty() {
                info!("📦 Months already loaded: None (empty table)");
            } else {
                let list: Vec<String> = existing.iter().map(|k| k.to_string()).collect();
                info!("📦 Months already loaded: {}", list.join(", "));
            }
            Ok(existing)
        }
        Err(e) if e.is_missing_table() => {
            warn!(error = %e, "target table does not exist yet, treating as empty");
            Ok(ExistingPartitions::new())
        }
        Err(e) => match policy {
            StatePolicy::Lenient => {
                warn!(error = %e, "Could not fetch existing months (table may be empty)");
                Ok(ExistingPartitions::new())
            }
            StatePolicy::Strict => Err(SyncError::StateQuery(e)),
        },
    }
}

/// One incremental step: make sure the table exists, read what is loaded,
/// and upload the earliest missing month.
#[tracing::instrument(level = "debug", skip_all, fields(destination = %dest.describe()))]
pub async fn sync_once(
    dest: &mut dyn Destination,
    dataset: &Dataset,
    options: &SyncOptions,
) -> Result<UploadOutcome, SyncError> {
    info!("Destination: {}", dest.describe());
    dest.ensure_table().await.map_err(SyncError::Schema)?;

    let existing = read_existing(dest, options.state_policy).await?;
    let plan = select_upload(dataset.partitions(), &existing);

    for skipped in &plan.skipped {
        info!(
            "⏭️  SKIP   | {} — already loaded ({} rows)",
            skipped.key.label(),
            skipped.rows
        );
    }

    let upload = match plan.selected {
        None => Upload::Nothing,
        Some(selected) if options.dry_run => {
            info!(
                "🔎 PLAN   | {} — {} rows would be uploaded (dry run)",
                selected.key.label(),
                selected.rows.len()
            );
            Upload::Planned {
                key: selected.key,
                rows: selected.rows.len(),
            }
        }
        Some(selected) => {
            let label = selected.key.label();
            info!("⬆️  UPLOAD | {} — {} rows uploading...", label, selected.rows.len());
            match dest.write_rows(&selected.rows).await {
                Ok(rows) => {
                    info!("✅  DONE   | {} — {} rows uploaded successfully!", label, rows);
                    info!("🛑 STOPPED | One month per run. Next month uploads on the next run.");
                    Upload::Uploaded {
                        key: selected.key,
                        rows,
                    }
                }
                Err(e) => {
                    error!("❌  ERROR  | {} — {}", label, e);
                    Upload::Failed {
                        key: selected.key,
                        rows: selected.rows.len(),
                        error: e.to_string(),
                    }
                }
            }
        }
    };

    let outcome = UploadOutcome {
        upload,
        skipped: plan.skipped.len(),
        pending: plan.pending,
    };
    log_summary(&outcome);
    Ok(outcome)
}

/// A full run: load the source file, then open the destination and take one
/// step. The destination is only opened once the file has loaded cleanly, and
/// is closed when this returns.
pub async fn run(config: &Config) -> Result<UploadOutcome, SyncError> {
    let dataset = dataset::load(&config.csv_path)?;
    let mut destination = warehouse::open_destination(config).await?;
    sync_once(destination.as_mut(), &dataset, &config.sync_options()).await
}

fn log_summary(outcome: &UploadOutcome) {
    info!("{}", "=".repeat(60));
    info!("📊 UPLOAD SUMMARY");
    info!("   ✅ Uploaded : {} month(s)", outcome.uploaded_count());
    info!("   ⏭️  Skipped  : {} month(s) (already existed)", outcome.skipped);
    info!("   ⏳ Pending  : {} month(s) for later runs", outcome.pending);
    info!("{}", "=".repeat(60));

    if matches!(outcome.upload, Upload::Nothing) {
        info!("🎉 Destination is already up to date — nothing new to upload!");
    }
}
