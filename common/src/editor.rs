// Interval edit run - fetch, filter, and rewrite sensor intervals one at a time

use crate::config::Settings;
use crate::errors::{EditorError, PrtgError};
use crate::filter::SensorFilter;
use crate::inheritance::{self, InheritanceToggle};
use crate::models::{Interval, RunSummary, Sensor, StopReason};
use crate::prtg::PrtgClient;
use crate::retry::{self, RetryStrategy};
use crate::table;
use crate::telemetry::log_results;
use anyhow::Context;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, info_span, instrument, warn, Instrument};

/// What to write and how to pace the edits
#[derive(Debug, Clone)]
pub struct EditorOptions {
    pub new_interval_seconds: u32,
    /// Pause before every edit request after the first
    pub request_delay: Duration,
    pub dry_run: bool,
}

/// Result of editing a single sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    DryRun,
    Rejected { status: u16, reason: String },
    InheritanceFailed,
    RequestFailed,
    /// Shutdown arrived while waiting to retry
    Interrupted,
}

/// Outcome of a whole run. `error` is set when the run was aborted early.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub error: Option<EditorError>,
}

impl RunReport {
    pub fn into_result(self) -> Result<RunSummary, EditorError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.summary),
        }
    }
}

/// Rewrites the polling interval of every sensor the filter selects
pub struct IntervalEditor {
    client: PrtgClient,
    filter: SensorFilter,
    inheritance: Arc<dyn InheritanceToggle>,
    retry_strategy: Arc<dyn RetryStrategy>,
    options: EditorOptions,
}

impl IntervalEditor {
    pub fn new(
        client: PrtgClient,
        filter: SensorFilter,
        inheritance: Arc<dyn InheritanceToggle>,
        retry_strategy: Arc<dyn RetryStrategy>,
        options: EditorOptions,
    ) -> Self {
        Self {
            client,
            filter,
            inheritance,
            retry_strategy,
            options,
        }
    }

    /// Wire up the editor from validated settings
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = PrtgClient::new(&settings.prtg).context("Failed to create PRTG client")?;
        let filter =
            SensorFilter::from_config(&settings.editor).context("Invalid sensor match rules")?;

        Ok(Self::new(
            client,
            filter,
            inheritance::from_config(&settings.editor),
            retry::from_settings(&settings.retry),
            EditorOptions {
                new_interval_seconds: settings.editor.new_interval_seconds,
                request_delay: Duration::from_secs(settings.editor.request_delay_seconds),
                dry_run: settings.editor.dry_run,
            },
        ))
    }

    /// Run one full pass and log the results, including on abort
    ///
    /// Sending `true` on the `shutdown` channel stops the run before the next
    /// sensor. The request in flight is allowed to finish.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> RunReport {
        let summary = RunSummary::start();
        let span = info_span!("interval_edit", run_id = %summary.run_id);
        self.run_inner(summary, shutdown).instrument(span).await
    }

    async fn run_inner(
        &self,
        mut summary: RunSummary,
        mut shutdown: watch::Receiver<bool>,
    ) -> RunReport {
        info!("Retrieving all sensors from PRTG...");
        let body = match self.client.fetch_sensor_table().await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Failed to retrieve sensors from PRTG");
                return finish(summary, StopReason::RetrievalFailed, Some(e.into()));
            }
        };
        info!("All sensors retrieved from PRTG!");

        info!("Formatting response from PRTG...");
        let sensors = match table::parse_sensors(&body) {
            Ok(sensors) => sensors,
            Err(e) => {
                error!(error = %e, "Failed to read sensor table");
                return finish(summary, StopReason::RetrievalFailed, Some(e.into()));
            }
        };
        info!(sensors = sensors.len(), "Response from PRTG has been formatted!");

        let matches = self.filter.select(&sensors);
        summary.matched = matches.len();
        info!(
            matched = summary.matched,
            new_interval = %Interval::from_seconds(self.options.new_interval_seconds),
            dry_run = self.options.dry_run,
            "Sensors selected for interval edit"
        );

        for (index, sensor) in matches.into_iter().enumerate() {
            if let Some(delay) = self.pacing_delay(index) {
                pause(delay, &mut shutdown).await;
            }
            if shutdown_requested(&shutdown) {
                warn!(
                    remaining = summary.matched - index,
                    "Shutdown requested, remaining sensors were not edited"
                );
                return finish(summary, StopReason::Interrupted, None);
            }

            match self.edit_sensor(sensor, &mut shutdown).await {
                Ok(EditOutcome::Edited) => summary.edits += 1,
                Ok(EditOutcome::DryRun) => summary.skipped += 1,
                Ok(EditOutcome::Interrupted) => {
                    summary.errors += 1;
                    return finish(summary, StopReason::Interrupted, None);
                }
                Ok(_) => summary.errors += 1,
                Err(e) => {
                    summary.errors += 1;
                    return finish(summary, StopReason::ConnectionTimedOut, Some(e));
                }
            }
        }

        finish(summary, StopReason::Completed, None)
    }

    /// Pause before the edit at `index`; never before the first one
    fn pacing_delay(&self, index: usize) -> Option<Duration> {
        let delay = self.options.request_delay;
        (index > 0 && !self.options.dry_run && !delay.is_zero()).then_some(delay)
    }

    /// Edit one sensor. Only an exhausted retry budget is an `Err`.
    #[instrument(skip(self, sensor, shutdown), fields(sensor_id = %sensor.id))]
    pub async fn edit_sensor(
        &self,
        sensor: &Sensor,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<EditOutcome, EditorError> {
        info!(
            "Editing time interval of sensor \"{}\" for device \"{}\" [ID: {}]...",
            sensor.name, sensor.device, sensor.id
        );

        if self.options.dry_run {
            info!(
                current_interval = %sensor.interval,
                "Dry run, sensor -- {} -- left unchanged",
                sensor
            );
            return Ok(EditOutcome::DryRun);
        }

        if let Err(e) = self.inheritance.disable(sensor).await {
            error!(
                error = %e,
                "Error switching interval inheritance off for sensor -- {} --",
                sensor
            );
            return Ok(EditOutcome::InheritanceFailed);
        }

        let outcome = self.set_interval_with_retry(sensor, shutdown).await?;
        match &outcome {
            EditOutcome::Edited => info!(
                "Sensor -- {} -- time interval was successfully edited from PRTG!",
                sensor
            ),
            EditOutcome::Rejected { status, reason } => {
                error!("Error editing the time interval of sensor -- {} --", sensor);
                error!("Caused by: {}", status);
                error!("{}", reason);
            }
            EditOutcome::Interrupted => warn!(
                "Shutdown requested before sensor -- {} -- could be edited",
                sensor
            ),
            _ => {}
        }
        Ok(outcome)
    }

    async fn set_interval_with_retry(
        &self,
        sensor: &Sensor,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<EditOutcome, EditorError> {
        let seconds = self.options.new_interval_seconds;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.client.set_interval(&sensor.id, seconds).await {
                Ok(status) => return Ok(status_outcome(status)),
                Err(e) if e.is_transient() => {
                    let url = self.client.redacted_set_interval_url(&sensor.id, seconds);
                    match self.retry_strategy.next_delay(attempt) {
                        Some(delay) => {
                            warn!(
                                error = %e,
                                attempt,
                                "The connection to {} failed. Retrying the connection in {:?}...",
                                url,
                                delay
                            );
                            if !pause(delay, shutdown).await {
                                return Ok(EditOutcome::Interrupted);
                            }
                        }
                        None => {
                            error!(
                                error = %e,
                                attempt,
                                "Error: Maximum connection retries exceeded. Ending the run."
                            );
                            return Err(EditorError::RetriesExhausted {
                                attempts: attempt,
                                url,
                            });
                        }
                    }
                }
                Err(e) => {
                    log_request_error(sensor, &e);
                    return Ok(EditOutcome::RequestFailed);
                }
            }
        }
    }
}

fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Sleep for `delay`. Returns `false` when shutdown cut the sleep short.
async fn pause(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if shutdown_requested(shutdown) {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = wait_for_shutdown(shutdown) => false,
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let requested = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !requested {
        // Sender gone, nobody can ask for shutdown any more
        std::future::pending::<()>().await;
    }
}

fn status_outcome(status: StatusCode) -> EditOutcome {
    if status == StatusCode::OK {
        EditOutcome::Edited
    } else {
        EditOutcome::Rejected {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }
}

fn log_request_error(sensor: &Sensor, err: &PrtgError) {
    error!(
        error = %err,
        "Error editing the time interval of sensor -- {} --",
        sensor
    );
}

fn finish(summary: RunSummary, reason: StopReason, error: Option<EditorError>) -> RunReport {
    let summary = summary.finish(reason);
    log_results(&summary);
    RunReport { summary, error }
}
