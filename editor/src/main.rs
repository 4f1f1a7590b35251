// Interval editor binary entry point
// Runs a single edit pass; meant to be started by cron or Task Scheduler.

use anyhow::{Context, Result};
use common::config::Settings;
use common::editor::IntervalEditor;
use common::models::StopReason;
use common::telemetry;
use std::process::ExitCode;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

const CONFIG_DIR_ENV: &str = "INTERVAL_EDITOR_CONFIG_DIR";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load configuration before logging, which depends on it
    let config_dir = std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| "config".to_string());
    let settings = Settings::load_from_path(&config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir))?;
    settings.validate().context("Invalid configuration")?;

    let tz = settings.timezone.tz()?;
    let log_path = telemetry::init_logging(&settings.observability, tz)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_dir = %config_dir,
        log_file = %log_path.display(),
        server_url = %settings.prtg.server_url,
        "Starting PRTG sensor interval editor"
    );

    let editor = IntervalEditor::from_settings(&settings).map_err(|e| {
        error!(error = %e, "Failed to initialize interval editor");
        e
    })?;

    // Ctrl+C lets the current request finish, then the summary is logged
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping after the current request");
                shutdown_tx.send_replace(true);
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    let report = editor.run(shutdown_rx).await;
    let interrupted = report.summary.reason == StopReason::Interrupted;
    match report.into_result() {
        Ok(summary) if interrupted => {
            warn!(
                edits = summary.edits,
                errors = summary.errors,
                "Interval editor interrupted"
            );
            Ok(ExitCode::from(130))
        }
        Ok(summary) => {
            info!(
                edits = summary.edits,
                errors = summary.errors,
                "Interval editor finished"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Interval editor aborted");
            Ok(ExitCode::FAILURE)
        }
    }
}
