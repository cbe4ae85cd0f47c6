use clap::Parser;
use salesload::{
    config::{Args, Config},
    logging,
    pipeline::{self, Upload},
};
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // ─── 1) config + logging ─────────────────────────────────────────
    let config = Config::from(Args::parse());
    let log = match logging::init(&config.log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialise logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    info!("{}", "=".repeat(60));
    info!("🚀 Starting monthly incremental upload");
    info!("{}", "=".repeat(60));
    info!(log_file = %log.file().display(), table = %config.table, "startup");

    // ─── 2) load, open destination, one incremental step ─────────────
    match pipeline::run(&config).await {
        Ok(outcome) => {
            if let Upload::Failed { key, .. } = &outcome.upload {
                error!(month = %key, "run finished without uploading; the month stays pending");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "run aborted");
            ExitCode::from(e.exit_code())
        }
    }
}

