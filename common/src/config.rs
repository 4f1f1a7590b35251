// Configuration management with layered configuration (file, env)

use crate::errors::ValidationError;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub prtg: PrtgConfig,
    #[serde(default)]
    pub timezone: TimezoneConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Connection details for the PRTG instance
#[derive(Clone, Serialize, Deserialize)]
pub struct PrtgConfig {
    pub server_url: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Takes priority over `password` when both are set
    #[serde(default)]
    pub passhash: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_sensor_count")]
    pub sensor_count: u32,
    #[serde(default = "default_columns")]
    pub columns: String,
}

// Hand-written so credentials stay out of debug output
impl std::fmt::Debug for PrtgConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrtgConfig")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("passhash", &redact(&self.passhash))
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("sensor_count", &self.sensor_count)
            .field("columns", &self.columns)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

fn default_request_timeout() -> u64 {
    60
}

fn default_sensor_count() -> u32 {
    50_000
}

fn default_columns() -> String {
    "probe,group,device,name,objid,interval".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimezoneConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl TimezoneConfig {
    /// Parse the configured IANA timezone name
    pub fn tz(&self) -> Result<Tz, ValidationError> {
        Tz::from_str(self.timezone.trim()).map_err(|e| ValidationError::InvalidFieldValue {
            field: "timezone.timezone".to_string(),
            reason: e.to_string(),
        })
    }
}

/// Which sensors to edit and what to set them to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default, deserialize_with = "string_list")]
    pub match_names: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub match_name_patterns: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub match_intervals: Vec<String>,
    #[serde(default = "default_new_interval")]
    pub new_interval_seconds: u32,
    #[serde(default)]
    pub request_delay_seconds: u64,
    #[serde(default)]
    pub inheritance_script: Option<PathBuf>,
    #[serde(default = "default_script_interpreter")]
    pub script_interpreter: String,
    #[serde(default)]
    pub dry_run: bool,
}

/// Accepts a TOML array or a comma separated string from the environment
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringList {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match StringList::deserialize(deserializer)? {
        StringList::List(items) => items,
        StringList::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect(),
    })
}

fn default_new_interval() -> u32 {
    3600
}

fn default_script_interpreter() -> String {
    "powershell.exe".to_string()
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            match_names: Vec::new(),
            match_name_patterns: Vec::new(),
            match_intervals: Vec::new(),
            new_interval_seconds: default_new_interval(),
            request_delay_seconds: 0,
            inheritance_script: None,
            script_interpreter: default_script_interpreter(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts per request, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_kind")]
    pub strategy: RetryKind,
    #[serde(default = "default_retry_delay")]
    pub delay_seconds: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: u64,
    #[serde(default)]
    pub jitter_factor: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_kind() -> RetryKind {
    RetryKind::Fixed
}

fn default_retry_delay() -> u64 {
    300
}

fn default_max_delay() -> u64 {
    1800
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: default_retry_kind(),
            delay_seconds: default_retry_delay(),
            max_delay_seconds: default_max_delay(),
            jitter_factor: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            json: false,
        }
    }
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Local overrides, typically holding credentials
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Values stay strings so numeric passhashes keep their leading zeros
            .add_source(Environment::with_prefix("APP").separator("__"));

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), ValidationError> {
        let url = self.prtg.server_url.trim();
        if url.is_empty() {
            return Err(ValidationError::MissingField("prtg.server_url".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ValidationError::InvalidFieldValue {
                field: "prtg.server_url".to_string(),
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.prtg.username.trim().is_empty() {
            return Err(ValidationError::MissingField("prtg.username".to_string()));
        }
        if self.prtg.password.is_empty() && self.prtg.passhash.is_empty() {
            return Err(ValidationError::MissingField(
                "prtg.password or prtg.passhash".to_string(),
            ));
        }
        if self.prtg.request_timeout_seconds == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "prtg.request_timeout_seconds".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        self.timezone.tz()?;

        if self.editor.new_interval_seconds == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "editor.new_interval_seconds".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.editor.match_names.is_empty()
            && self.editor.match_name_patterns.is_empty()
            && self.editor.match_intervals.is_empty()
        {
            return Err(ValidationError::MissingField(
                "editor.match_names, editor.match_name_patterns or editor.match_intervals"
                    .to_string(),
            ));
        }
        for pattern in &self.editor.match_name_patterns {
            Regex::new(pattern).map_err(|e| ValidationError::InvalidFieldValue {
                field: "editor.match_name_patterns".to_string(),
                reason: format!("'{}': {}", pattern, e),
            })?;
        }

        if self.retry.max_attempts == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "retry.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(ValidationError::InvalidFieldValue {
                field: "retry.jitter_factor".to_string(),
                reason: "must be between 0.0 and 1.0".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_settings(server_url: &str) -> Settings {
    Settings {
        prtg: PrtgConfig {
            server_url: server_url.to_string(),
            username: "prtgadmin".to_string(),
            password: "s3cret&pw".to_string(),
            passhash: String::new(),
            request_timeout_seconds: 5,
            sensor_count: default_sensor_count(),
            columns: default_columns(),
        },
        timezone: TimezoneConfig::default(),
        editor: EditorConfig {
            match_names: vec!["Example Sensor Name".to_string()],
            match_intervals: vec!["1 h".to_string(), "30 m".to_string()],
            ..EditorConfig::default()
        },
        retry: RetrySettings {
            delay_seconds: 0,
            ..RetrySettings::default()
        },
        observability: ObservabilityConfig::default(),
    }
}
