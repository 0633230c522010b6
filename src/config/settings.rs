//! Application settings and paths.
//!
//! An optional JSON settings file supplies defaults for scan options that
//! were not given on the command line.

use crate::error::{ConfigError, ConfigResult};
use crate::report::ReportFormat;
use crate::scanner::ScanConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/portsweep)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the platform configuration directory.
    pub fn discover() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "portsweep", "portsweep")
            .ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Defaults for scan options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Number of concurrent workers.
    pub threads: usize,
    /// Send (and connect) timeout in seconds.
    pub send_timeout_secs: u64,
    /// Receive timeout in seconds.
    pub recv_timeout_secs: u64,
    /// Retry budget for transient connect errors.
    pub max_retries: u32,
    /// Exchange the probe payload with open ports.
    pub send_probe: bool,
    /// Base directory for reports.
    pub report_dir: PathBuf,
    /// Report line encoding.
    pub report_format: ReportFormat,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            threads: ScanConfig::DEFAULT_WORKERS,
            send_timeout_secs: ScanConfig::DEFAULT_TIMEOUT_SECS,
            recv_timeout_secs: ScanConfig::DEFAULT_TIMEOUT_SECS,
            max_retries: ScanConfig::DEFAULT_MAX_RETRIES,
            send_probe: true,
            report_dir: PathBuf::from("reports"),
            report_format: ReportFormat::Text,
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, or defaults if absent.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::discover()?.settings_file();

        if !file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Build the base scan configuration these settings describe.
    pub fn to_scan_config(&self) -> ScanConfig {
        ScanConfig::new()
            .with_workers(self.threads)
            .with_send_timeout(Duration::from_secs(self.send_timeout_secs))
            .with_recv_timeout(Duration::from_secs(self.recv_timeout_secs))
            .with_max_retries(self.max_retries)
            .with_probe(self.send_probe)
            .with_report_dir(&self.report_dir)
            .with_format(self.report_format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.threads, 8);
        assert_eq!(settings.send_timeout_secs, 5);
        assert_eq!(settings.recv_timeout_secs, 5);
        assert_eq!(settings.max_retries, 3);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "threads": 64, "report_format": "json" }"#).unwrap();

        let settings = AppSettings::load_from(&path).unwrap();
        assert_eq!(settings.threads, 64);
        assert_eq!(settings.report_format, ReportFormat::Json);
        assert_eq!(settings.recv_timeout_secs, 5);

        let config = settings.to_scan_config();
        assert_eq!(config.worker_count, 64);
        assert_eq!(config.report_format, ReportFormat::Json);
        assert_eq!(config.send_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppSettings::load_from(&path),
            Err(ConfigError::InvalidFormat(_))
        ));
        assert!(matches!(
            AppSettings::load_from(&dir.path().join("missing.json")),
            Err(ConfigError::ReadFailed { .. })
        ));
    }
}
