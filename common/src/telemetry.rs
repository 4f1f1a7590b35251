// Telemetry module for structured logging to the console and a per-run log file

use crate::config::ObservabilityConfig;
use crate::models::RunSummary;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Timestamp format used inside log lines
pub const LOG_TIME_FORMAT: &str = "%m-%d-%Y %I:%M:%S %p %Z";

const SUMMARY_RULE: &str = "===========================================================";

/// Renders log timestamps in the configured timezone
#[derive(Debug, Clone, Copy)]
pub struct TimezoneTimer {
    tz: Tz,
}

impl TimezoneTimer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl FormatTime for TimezoneTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", format_timestamp(Utc::now(), self.tz))
    }
}

/// Render an instant as a log line timestamp in `tz`
pub fn format_timestamp(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format(LOG_TIME_FORMAT).to_string()
}

/// Name of the log file for a run started at `started`
pub fn log_file_name(started: DateTime<Tz>) -> String {
    format!(
        "time_interval_log-{}.log",
        started.format("%Y-%m-%d_%I-%M-%S-%p-%Z")
    )
}

/// Create the log directory and an empty log file for this run
pub fn create_log_file(log_dir: &Path, tz: Tz) -> Result<(PathBuf, File)> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let path = log_dir.join(log_file_name(Utc::now().with_timezone(&tz)));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;
    Ok((path, file))
}

/// Initialize logging to stdout and a timestamped file under `log_dir`
///
/// `RUST_LOG` overrides the configured level. Returns the log file path.
pub fn init_logging(config: &ObservabilityConfig, tz: Tz) -> Result<PathBuf> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let (path, file) = create_log_file(&config.log_dir, tz)?;
    let timer = TimezoneTimer::new(tz);

    let mut layers = Vec::new();
    if config.json {
        layers.push(
            fmt::layer()
                .json()
                .with_timer(timer)
                .with_writer(std::io::stdout)
                .boxed(),
        );
        layers.push(
            fmt::layer()
                .json()
                .with_timer(timer)
                .with_writer(Mutex::new(file))
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_target(false)
                .with_timer(timer)
                .with_writer(std::io::stdout)
                .boxed(),
        );
        layers.push(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(Mutex::new(file))
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    info!(
        log_level = %config.log_level,
        log_file = %path.display(),
        timezone = %tz,
        "Logging initialized"
    );

    Ok(path)
}

/// Write the closing block of a run
pub fn log_results(summary: &RunSummary) {
    info!("");
    info!("{}", SUMMARY_RULE);
    info!("");
    info!(
        run_id = %summary.run_id,
        matched = summary.matched,
        skipped = summary.skipped,
        "Time interval edit job completed. {}",
        summary.reason
    );
    info!("Total time interval edits: {}", summary.edits);
    info!("Total time interval edit errors: {}", summary.errors);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StopReason;
    use chrono::TimeZone;
    use std::io;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_name_uses_timezone() {
        let started = chrono_tz::America::New_York
            .with_ymd_and_hms(2021, 3, 4, 15, 6, 7)
            .unwrap();
        assert_eq!(
            log_file_name(started),
            "time_interval_log-2021-03-04_03-06-07-PM-EST.log"
        );
    }

    #[test]
    fn test_create_log_file_creates_directory() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("nested").join("logs");

        let (path, _file) = create_log_file(&log_dir, chrono_tz::UTC).unwrap();

        assert!(log_dir.is_dir());
        assert!(path.starts_with(&log_dir));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("time_interval_log-"));
        assert!(name.ends_with("-UTC.log"));
    }

    #[test]
    fn test_timestamp_in_configured_timezone() {
        let at = Utc.with_ymd_and_hms(2021, 7, 1, 16, 30, 0).unwrap();
        assert_eq!(
            format_timestamp(at, chrono_tz::Europe::Berlin),
            "07-01-2021 06:30:00 PM CEST"
        );
        assert_eq!(
            format_timestamp(at, chrono_tz::UTC),
            "07-01-2021 04:30:00 PM UTC"
        );
    }

    /// In-memory log sink shared with the subscriber
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLog {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(|line| line.trim_end().to_string())
                .collect()
        }
    }

    #[test]
    fn test_log_results_writes_closing_block() {
        let captured = CapturedLog::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_target(false)
            .with_level(false)
            .without_time()
            .finish();

        let mut summary = RunSummary::start();
        summary.matched = 3;
        summary.edits = 2;
        summary.errors = 1;
        let summary = summary.finish(StopReason::Completed);
        tracing::subscriber::with_default(subscriber, || log_results(&summary));

        let lines = captured.lines();
        assert_eq!(lines.len(), 6, "{:?}", lines);
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], SUMMARY_RULE);
        assert_eq!(lines[2], "");
        assert!(lines[3].contains("Time interval edit job completed. Sensors edited from PRTG."));
        assert_eq!(lines[4], "Total time interval edits: 2");
        assert_eq!(lines[5], "Total time interval edit errors: 1");
    }
}
