use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

pub const DEFAULT_SIGNATURE_URL: &str =
    "https://raw.githubusercontent.com/Rajapakar/sict/main/virus-signatures.txt";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub signature_url: String,
    pub signature_file: Option<String>,
    pub scan_root: Option<String>,
    pub quarantine_dir: String,
    pub ignore_patterns: Vec<String>,
    pub follow_symlinks: bool,
    pub auto_update: bool,
    pub auto_scan: bool,
    pub update_interval_minutes: u64,
    pub auto_scan_interval_minutes: u64,
    pub alerts: bool,
    pub sound: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            signature_url: DEFAULT_SIGNATURE_URL.to_string(),
            signature_file: None,
            scan_root: None,
            quarantine_dir: "quarantine".to_string(),
            ignore_patterns: Vec::new(),
            follow_symlinks: false,
            auto_update: true,
            auto_scan: true,
            update_interval_minutes: 5,
            auto_scan_interval_minutes: 10,
            alerts: true,
            sound: true,
        }
    }
}

impl AppConfig {
    pub fn update_interval(&self) -> Duration {
        minutes(self.update_interval_minutes)
    }

    pub fn auto_scan_interval(&self) -> Duration {
        minutes(self.auto_scan_interval_minutes)
    }

    pub fn quarantine_path(&self) -> PathBuf {
        PathBuf::from(&self.quarantine_dir)
    }
}

// A zero interval would spin the timer thread; huge values saturate.
fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.max(1).saturating_mul(60))
}

/// Load `Config.toml` from the working directory (optional), then overlay
/// `HASHGUARD_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from("Config")
}

pub fn load_configuration_from(name: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .add_source(
            Environment::with_prefix("HASHGUARD")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

pub fn save_configuration(path: &Path, config: &AppConfig) -> Result<(), Error> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| Error::Other(format!("Unable to serialize configuration: {}", e)))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, rendered)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("absent");
        let config = load_configuration_from(name.to_str().unwrap()).unwrap();
        assert_eq!(config.quarantine_dir, "quarantine");
        assert_eq!(config.update_interval(), Duration::from_secs(300));
        assert_eq!(config.auto_scan_interval(), Duration::from_secs(600));
        assert!(!config.follow_symlinks);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Partial.toml");
        fs::write(&path, "scan_root = \"/srv/share\"\nsound = false\n").unwrap();

        let name = dir.path().join("Partial");
        let config = load_configuration_from(name.to_str().unwrap()).unwrap();
        assert_eq!(config.scan_root.as_deref(), Some("/srv/share"));
        assert!(!config.sound);
        assert!(config.alerts);
        assert_eq!(config.signature_url, DEFAULT_SIGNATURE_URL);
    }

    #[test]
    fn test_saved_configuration_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("Saved.toml");
        let config = AppConfig {
            quarantine_dir: "/var/quarantine".to_string(),
            ignore_patterns: vec!["**/node_modules".to_string()],
            auto_scan: false,
            ..AppConfig::default()
        };
        save_configuration(&path, &config).unwrap();

        let name = dir.path().join("nested").join("Saved");
        let loaded = load_configuration_from(name.to_str().unwrap()).unwrap();
        assert_eq!(loaded.quarantine_dir, "/var/quarantine");
        assert_eq!(loaded.ignore_patterns, vec!["**/node_modules".to_string()]);
        assert!(!loaded.auto_scan);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = AppConfig {
            update_interval_minutes: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.update_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_huge_interval_saturates() {
        let config = AppConfig {
            update_interval_minutes: u64::MAX,
            auto_scan_interval_minutes: u64::MAX / 60 + 1,
            ..AppConfig::default()
        };
        assert_eq!(config.update_interval(), Duration::from_secs(u64::MAX));
        assert_eq!(config.auto_scan_interval(), Duration::from_secs(u64::MAX));
    }
}
