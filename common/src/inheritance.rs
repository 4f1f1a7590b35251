// Interval inheritance toggle
// PRTG ignores a sensor's own interval while it inherits from its parent, so
// inheritance is switched off by an external script before every edit.

use crate::config::EditorConfig;
use crate::errors::InheritanceError;
use crate::models::Sensor;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Switches interval inheritance off for a sensor
#[async_trait]
pub trait InheritanceToggle: Send + Sync {
    async fn disable(&self, sensor: &Sensor) -> Result<(), InheritanceError>;
}

/// Build the toggle described by the editor settings
pub fn from_config(config: &EditorConfig) -> Arc<dyn InheritanceToggle> {
    match &config.inheritance_script {
        Some(script) => Arc::new(ScriptInheritanceToggle::new(
            config.script_interpreter.clone(),
            script.clone(),
        )),
        None => Arc::new(NoopInheritanceToggle),
    }
}

/// Runs `<interpreter> <script> <sensor id>` and waits for it to exit
#[derive(Debug, Clone)]
pub struct ScriptInheritanceToggle {
    interpreter: String,
    script: PathBuf,
}

impl ScriptInheritanceToggle {
    pub fn new(interpreter: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
        }
    }
}

#[async_trait]
impl InheritanceToggle for ScriptInheritanceToggle {
    #[instrument(skip(self, sensor), fields(sensor_id = %sensor.id))]
    async fn disable(&self, sensor: &Sensor) -> Result<(), InheritanceError> {
        debug!(
            interpreter = %self.interpreter,
            script = %self.script.display(),
            "Running inheritance script"
        );

        // Script output goes straight to our stdout
        let status = Command::new(&self.interpreter)
            .arg(&self.script)
            .arg(&sensor.id)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                InheritanceError::Spawn(format!(
                    "{} {}: {}",
                    self.interpreter,
                    self.script.display(),
                    e
                ))
            })?;

        if !status.success() {
            return Err(InheritanceError::ExitStatus {
                sensor_id: sensor.id.clone(),
                code: status.code(),
            });
        }

        info!("Interval inheritance switched off");
        Ok(())
    }
}

/// Used when no inheritance script is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInheritanceToggle;

#[async_trait]
impl InheritanceToggle for NoopInheritanceToggle {
    async fn disable(&self, sensor: &Sensor) -> Result<(), InheritanceError> {
        debug!(sensor_id = %sensor.id, "No inheritance script configured, skipping");
        Ok(())
    }
}
