// Tests for layered configuration loading

use common::config::{RetryKind, Settings};
use std::fs;
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

// Environment variables are process wide, so every test here holds this lock
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sets variables for the life of the guard
struct EnvVars(Vec<&'static str>);

impl EnvVars {
    fn set(vars: &[(&'static str, &str)]) -> Self {
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        Self(vars.iter().map(|(key, _)| *key).collect())
    }
}

impl Drop for EnvVars {
    fn drop(&mut self) {
        for key in &self.0 {
            std::env::remove_var(key);
        }
    }
}

const DEFAULT_TOML: &str = r#"
[prtg]
server_url = "https://prtg.example.com"
username = "prtgadmin"

[timezone]
timezone = "America/New_York"

[editor]
match_names = ["Example Sensor Name"]
match_intervals = ["1 h", "30 m"]
"#;

#[test]
fn test_defaults_fill_missing_sections() {
    let _lock = env_lock();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("default.toml"), DEFAULT_TOML).unwrap();

    let settings = Settings::load_from_path(temp_dir.path()).unwrap();

    assert_eq!(settings.prtg.sensor_count, 50_000);
    assert_eq!(settings.prtg.columns, "probe,group,device,name,objid,interval");
    assert_eq!(settings.editor.new_interval_seconds, 3600);
    assert_eq!(settings.editor.script_interpreter, "powershell.exe");
    assert!(settings.editor.inheritance_script.is_none());
    assert_eq!(settings.retry.max_attempts, 3);
    assert_eq!(settings.retry.strategy, RetryKind::Fixed);
    assert_eq!(settings.retry.delay_seconds, 300);
    assert_eq!(settings.observability.log_level, "info");
}

#[test]
fn test_local_file_overrides_default() {
    let _lock = env_lock();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("default.toml"), DEFAULT_TOML).unwrap();
    fs::write(
        temp_dir.path().join("local.toml"),
        r#"
[prtg]
passhash = "1234567890"

[editor]
new_interval_seconds = 900
dry_run = true

[retry]
strategy = "exponential"
"#,
    )
    .unwrap();

    let settings = Settings::load_from_path(temp_dir.path()).unwrap();

    assert_eq!(settings.prtg.server_url, "https://prtg.example.com");
    assert_eq!(settings.prtg.passhash, "1234567890");
    assert_eq!(settings.editor.new_interval_seconds, 900);
    assert!(settings.editor.dry_run);
    assert_eq!(settings.editor.match_intervals, vec!["1 h", "30 m"]);
    assert_eq!(settings.retry.strategy, RetryKind::Exponential);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_missing_credentials_fail_validation() {
    let _lock = env_lock();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("default.toml"), DEFAULT_TOML).unwrap();

    let settings = Settings::load_from_path(temp_dir.path()).unwrap();

    assert!(settings.validate().is_err());
}

#[test]
fn test_missing_server_section_fails_to_load() {
    let _lock = env_lock();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("default.toml"), "[editor]\ndry_run = true\n").unwrap();

    assert!(Settings::load_from_path(temp_dir.path()).is_err());
}

#[test]
fn test_shipped_default_config_parses() {
    let _lock = env_lock();
    let config_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../config");
    let temp_dir = TempDir::new().unwrap();
    fs::copy(
        format!("{}/default.toml", config_dir),
        temp_dir.path().join("default.toml"),
    )
    .unwrap();
    fs::write(
        temp_dir.path().join("local.toml"),
        "[prtg]\nserver_url = \"https://prtg.example.com\"\nusername = \"prtgadmin\"\npassword = \"pw\"\n",
    )
    .unwrap();

    let settings = Settings::load_from_path(temp_dir.path()).unwrap();

    assert!(settings.validate().is_ok());
    assert_eq!(settings.editor.match_names, vec!["Example Sensor Name"]);
}

#[test]
fn test_env_credentials_keep_their_exact_text() {
    let _lock = env_lock();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("default.toml"), DEFAULT_TOML).unwrap();
    let _env = EnvVars::set(&[
        ("APP__PRTG__PASSHASH", "0123456789"),
        ("APP__PRTG__PASSWORD", "1.50"),
        ("APP__PRTG__USERNAME", "1000"),
    ]);

    let settings = Settings::load_from_path(temp_dir.path()).unwrap();

    assert_eq!(settings.prtg.passhash, "0123456789");
    assert_eq!(settings.prtg.password, "1.50");
    assert_eq!(settings.prtg.username, "1000");
    assert!(settings.validate().is_ok());
}

#[test]
fn test_env_overrides_numbers_flags_and_lists() {
    let _lock = env_lock();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("default.toml"), DEFAULT_TOML).unwrap();
    let _env = EnvVars::set(&[
        ("APP__PRTG__REQUEST_TIMEOUT_SECONDS", "15"),
        ("APP__EDITOR__DRY_RUN", "true"),
        ("APP__EDITOR__MATCH_INTERVALS", "5 m, 10 m"),
        ("APP__RETRY__STRATEGY", "exponential"),
        ("APP__RETRY__JITTER_FACTOR", "0.25"),
    ]);

    let settings = Settings::load_from_path(temp_dir.path()).unwrap();

    assert_eq!(settings.prtg.request_timeout_seconds, 15);
    assert!(settings.editor.dry_run);
    assert_eq!(settings.editor.match_intervals, vec!["5 m", "10 m"]);
    assert_eq!(settings.editor.match_names, vec!["Example Sensor Name"]);
    assert_eq!(settings.retry.strategy, RetryKind::Exponential);
    assert_eq!(settings.retry.jitter_factor, 0.25);
}
