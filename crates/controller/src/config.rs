//! Controller configuration management

use crate::issuer::RetryPolicy;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory name under the user's config dir
const APP_NAME: &str = "mesh-controller";

/// Config file name
const CONFIG_FILENAME: &str = "controller.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub controller: ControllerSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub listen: ListenSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSettings {
    pub log_level: String,
}

/// USB identity and layout of the dongle
///
/// Defaults match the stock mesh controller firmware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "DeviceSettings::default_vendor_id")]
    pub vendor_id: u16,
    #[serde(default = "DeviceSettings::default_product_id")]
    pub product_id: u16,
    #[serde(default = "DeviceSettings::default_configuration")]
    pub configuration: u8,
    #[serde(default = "DeviceSettings::default_interface")]
    pub interface: u8,
    #[serde(default)]
    pub alt_setting: u8,
    /// Bulk IN endpoint number (without the direction bit)
    #[serde(default = "DeviceSettings::default_endpoint_in")]
    pub endpoint_in: u8,
    /// Bulk OUT endpoint number
    #[serde(default = "DeviceSettings::default_endpoint_out")]
    pub endpoint_out: u8,
    /// Let libusb detach any kernel driver bound to the interface
    #[serde(default = "DeviceSettings::default_auto_detach")]
    pub auto_detach: bool,
    /// Upper bound on one blocking read; bounds how long a stop request waits
    #[serde(default = "DeviceSettings::default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "DeviceSettings::default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            vendor_id: Self::default_vendor_id(),
            product_id: Self::default_product_id(),
            configuration: Self::default_configuration(),
            interface: Self::default_interface(),
            alt_setting: 0,
            endpoint_in: Self::default_endpoint_in(),
            endpoint_out: Self::default_endpoint_out(),
            auto_detach: Self::default_auto_detach(),
            read_timeout_ms: Self::default_read_timeout_ms(),
            write_timeout_ms: Self::default_write_timeout_ms(),
        }
    }
}

impl DeviceSettings {
    fn default_vendor_id() -> u16 {
        0x2fe3
    }

    fn default_product_id() -> u16 {
        0x0100
    }

    fn default_configuration() -> u8 {
        1
    }

    fn default_interface() -> u8 {
        1
    }

    fn default_endpoint_in() -> u8 {
        2
    }

    fn default_endpoint_out() -> u8 {
        1
    }

    fn default_auto_detach() -> bool {
        true
    }

    fn default_read_timeout_ms() -> u64 {
        500
    }

    fn default_write_timeout_ms() -> u64 {
        1000
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Write retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts per command, including the first
    #[serde(default = "RetrySettings::default_attempts")]
    pub attempts: u32,
    /// Delay between attempts
    #[serde(default = "RetrySettings::default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: Self::default_attempts(),
            backoff_ms: Self::default_backoff_ms(),
        }
    }
}

impl RetrySettings {
    fn default_attempts() -> u32 {
        2 // One retry
    }

    fn default_backoff_ms() -> u64 {
        200
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_millis(self.backoff_ms))
    }
}

/// Event listener behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenSettings {
    /// Events buffered before the dispatcher blocks
    #[serde(default = "ListenSettings::default_channel_capacity")]
    pub channel_capacity: usize,
    /// Pause after a transient read error
    #[serde(default = "ListenSettings::default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// Add an app key after SetupStatus and configure every added node
    #[serde(default)]
    pub auto_setup: bool,
    /// Provision every device that sends an unprovisioned beacon
    #[serde(default)]
    pub auto_provision: bool,
    /// App key slot used by the automatic flows
    #[serde(default)]
    pub app_key_index: u16,
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            channel_capacity: Self::default_channel_capacity(),
            error_backoff_ms: Self::default_error_backoff_ms(),
            auto_setup: false,
            auto_provision: false,
            app_key_index: 0,
        }
    }
}

impl ListenSettings {
    fn default_channel_capacity() -> usize {
        common::DEFAULT_EVENT_CAPACITY
    }

    fn default_error_backoff_ms() -> u64 {
        100
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            controller: ControllerSettings {
                log_level: "info".to_string(),
            },
            device: DeviceSettings::default(),
            retry: RetrySettings::default(),
            listen: ListenSettings::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc").join(APP_NAME).join(CONFIG_FILENAME),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: ControllerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join(APP_NAME).join(CONFIG_FILENAME)
        } else {
            PathBuf::from(".config").join(APP_NAME).join(CONFIG_FILENAME)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.controller.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.controller.log_level,
                valid_levels.join(", ")
            ));
        }

        for (name, number) in [
            ("endpoint_in", self.device.endpoint_in),
            ("endpoint_out", self.device.endpoint_out),
        ] {
            if !(1..=15).contains(&number) {
                return Err(anyhow!(
                    "Invalid {} {}, endpoint numbers must be 1-15",
                    name,
                    number
                ));
            }
        }

        // libusb treats 0 as "wait forever", which would make the listener unstoppable
        if self.device.read_timeout_ms == 0 {
            return Err(anyhow!("device.read_timeout_ms must be greater than 0"));
        }

        if self.retry.attempts == 0 {
            return Err(anyhow!("retry.attempts must be at least 1"));
        }

        if self.listen.channel_capacity == 0 {
            return Err(anyhow!("listen.channel_capacity must be at least 1"));
        }

        Ok(())
    }
}

/// Load a config file from a path that may start with `~`
pub fn load_config(path: &str) -> Result<ControllerConfig> {
    let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
    ControllerConfig::load(Some(path_buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert_eq!(config.controller.log_level, "info");
        assert_eq!(config.device.vendor_id, 0x2fe3);
        assert_eq!(config.device.product_id, 0x0100);
        assert_eq!(config.device.configuration, 1);
        assert_eq!(config.device.interface, 1);
        assert_eq!(config.device.alt_setting, 0);
        assert_eq!(config.device.endpoint_in, 2);
        assert_eq!(config.device.endpoint_out, 1);
        assert_eq!(config.retry.attempts, 2);
        assert_eq!(config.retry.backoff_ms, 200);
        assert!(!config.listen.auto_setup);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_policy_from_settings() {
        let policy = RetrySettings::default().policy();
        assert_eq!(policy.attempts(), 2);
        assert_eq!(policy.backoff(), Duration::from_millis(200));
    }

    #[test]
    fn test_config_serialization() {
        let config = ControllerConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: ControllerConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.controller.log_level, parsed.controller.log_level);
        assert_eq!(config.device.vendor_id, parsed.device.vendor_id);
        assert_eq!(config.listen.channel_capacity, parsed.listen.channel_capacity);
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = ControllerConfig::default();
        config.controller.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.controller.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_read_timeout() {
        let mut config = ControllerConfig::default();
        config.device.read_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_endpoints() {
        let mut config = ControllerConfig::default();
        config.device.endpoint_in = 0;
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::default();
        config.device.endpoint_out = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = ControllerConfig::default();
        config.retry.attempts = 0;
        assert!(config.validate().is_err());
    }
}
