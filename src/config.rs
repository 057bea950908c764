//! Persistent configuration for the fan remote

use crate::errors::{FanRemoteError, Result};
use crate::fan_control::DEFAULT_DEBOUNCE_THRESHOLD_C;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the configured device address
pub const ENV_DEVICE_URL: &str = "FAN_REMOTE_DEVICE_URL";

/// Address of the device's soft access point
pub const DEFAULT_DEVICE_URL: &str = "http://192.168.4.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanRemoteConfig {
    /// Base URL of the sensor device, e.g. `http://192.168.1.40`
    pub device_url: String,
    /// Period of the auto-mode re-evaluation timer
    pub poll_interval_ms: u64,
    pub debounce_threshold_c: f32,
    /// Fetch a fresh reading on every tick instead of only on start/refresh
    pub fetch_on_tick: bool,
    /// Drop network completions that were overtaken by a newer request
    pub discard_stale_completions: bool,
    /// Per-request timeout. `None` waits forever.
    pub request_timeout_ms: Option<u64>,
}

impl Default for FanRemoteConfig {
    fn default() -> Self {
        Self {
            device_url: DEFAULT_DEVICE_URL.to_string(),
            poll_interval_ms: 1000,
            debounce_threshold_c: DEFAULT_DEBOUNCE_THRESHOLD_C,
            fetch_on_tick: false,
            discard_stale_completions: true,
            request_timeout_ms: None,
        }
    }
}

impl FanRemoteConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.device_url.starts_with("http://") || self.device_url.starts_with("https://")) {
            return Err(FanRemoteError::Config(format!(
                "Device URL must start with http:// or https://: {}",
                self.device_url
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(FanRemoteError::Config(
                "Poll interval must be greater than zero".to_string(),
            ));
        }
        if !self.debounce_threshold_c.is_finite() || self.debounce_threshold_c < 0.0 {
            return Err(FanRemoteError::Config(format!(
                "Invalid debounce threshold: {}",
                self.debounce_threshold_c
            )));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(FanRemoteError::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply the environment override for the device address
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_DEVICE_URL) {
            debug!("Device URL overridden by {}: {}", ENV_DEVICE_URL, url);
            self.device_url = url;
        }
    }

    /// Write atomically: temp file first, then rename over the target
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)?;

        fs::rename(&temp_path, path).map_err(|e| {
            error!("Failed to rename temp config file: {}", e);
            let _ = fs::remove_file(&temp_path);
            FanRemoteError::Io(e)
        })?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: FanRemoteConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
                .map_err(|e| FanRemoteError::Config(format!("Failed to load config: {}", e)))
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn get_config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".fan_remote").join("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("fan_remote_test_{}_{}", name, std::process::id()))
            .join("config.json")
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = FanRemoteConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), None);
        assert!(!config.fetch_on_tick);
        assert!(config.discard_stale_completions);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_config_path("save_load");
        let config = FanRemoteConfig {
            device_url: "http://10.0.0.7".to_string(),
            fetch_on_tick: true,
            request_timeout_ms: Some(2500),
            ..FanRemoteConfig::default()
        };

        config.save_to_file(&path).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(FanRemoteConfig::load_from_file(&path).unwrap(), config);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: FanRemoteConfig =
            serde_json::from_str(r#"{"device_url": "http://esp32.local"}"#).unwrap();
        assert_eq!(config.device_url, "http://esp32.local");
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.debounce_threshold_c, DEFAULT_DEBOUNCE_THRESHOLD_C);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = temp_config_path("missing");
        assert_eq!(
            FanRemoteConfig::load_or_default(&path).unwrap(),
            FanRemoteConfig::default()
        );
    }

    #[test]
    fn test_validation_errors() {
        let bad_url = FanRemoteConfig {
            device_url: "192.168.4.1".to_string(),
            ..FanRemoteConfig::default()
        };
        assert!(matches!(bad_url.validate(), Err(FanRemoteError::Config(_))));

        let zero_interval = FanRemoteConfig {
            poll_interval_ms: 0,
            ..FanRemoteConfig::default()
        };
        assert!(zero_interval.validate().is_err());

        let negative_debounce = FanRemoteConfig {
            debounce_threshold_c: -1.0,
            ..FanRemoteConfig::default()
        };
        assert!(negative_debounce.validate().is_err());
    }
}
