//! Integration tests for configuration parsing
//!
//! Tests controller configuration files, including:
//! - Full config with all options
//! - Partial configs falling back to defaults
//! - Invalid configuration handling
//! - Save and reload

use mesh_controller::{ControllerConfig, load_config};
use std::io::Write;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

const MINIMAL_CONFIG: &str = r#"
[controller]
log_level = "info"
"#;

const FULL_CONFIG: &str = r#"
[controller]
log_level = "debug"

[device]
vendor_id = 0x1234
product_id = 0x5678
configuration = 2
interface = 0
alt_setting = 1
endpoint_in = 3
endpoint_out = 4
auto_detach = false
read_timeout_ms = 250
write_timeout_ms = 750

[retry]
attempts = 5
backoff_ms = 50

[listen]
channel_capacity = 16
error_backoff_ms = 10
auto_setup = true
auto_provision = true
app_key_index = 1
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_minimal_config_uses_defaults() {
    let file = write_config(MINIMAL_CONFIG);
    let config = ControllerConfig::load(Some(file.path().to_path_buf())).unwrap();

    assert_eq!(config.device.vendor_id, 0x2fe3);
    assert_eq!(config.device.product_id, 0x0100);
    assert_eq!(config.device.interface, 1);
    assert_eq!(config.device.read_timeout(), Duration::from_millis(500));
    assert_eq!(config.retry.policy().attempts(), 2);
    assert_eq!(config.listen.channel_capacity, 256);
    assert_eq!(config.listen.error_backoff(), Duration::from_millis(100));
    assert!(!config.listen.auto_provision);
}

#[test]
fn test_full_config() {
    let file = write_config(FULL_CONFIG);
    let config = ControllerConfig::load(Some(file.path().to_path_buf())).unwrap();

    assert_eq!(config.controller.log_level, "debug");
    assert_eq!(config.device.vendor_id, 0x1234);
    assert_eq!(config.device.product_id, 0x5678);
    assert_eq!(config.device.configuration, 2);
    assert_eq!(config.device.interface, 0);
    assert_eq!(config.device.alt_setting, 1);
    assert_eq!(config.device.endpoint_in, 3);
    assert_eq!(config.device.endpoint_out, 4);
    assert!(!config.device.auto_detach);
    assert_eq!(config.device.write_timeout(), Duration::from_millis(750));

    let policy = config.retry.policy();
    assert_eq!(policy.attempts(), 5);
    assert_eq!(policy.backoff(), Duration::from_millis(50));

    assert_eq!(config.listen.channel_capacity, 16);
    assert!(config.listen.auto_setup);
    assert!(config.listen.auto_provision);
    assert_eq!(config.listen.app_key_index, 1);
}

#[test]
fn test_invalid_values_are_rejected() {
    for bad in [
        "[controller]\nlog_level = \"loud\"\n",
        "[controller]\nlog_level = \"info\"\n[retry]\nattempts = 0\n",
        "[controller]\nlog_level = \"info\"\n[device]\nread_timeout_ms = 0\n",
        "[controller]\nlog_level = \"info\"\n[listen]\nchannel_capacity = 0\n",
    ] {
        let file = write_config(bad);
        assert!(
            ControllerConfig::load(Some(file.path().to_path_buf())).is_err(),
            "accepted: {}",
            bad
        );
    }
}

#[test]
fn test_unparseable_file() {
    let file = write_config("this is not toml [");
    let err = ControllerConfig::load(Some(file.path().to_path_buf())).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(ControllerConfig::load(Some(path)).is_err());
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("controller.toml");

    let mut config = ControllerConfig::default();
    config.device.product_id = 0x0200;
    config.listen.auto_setup = true;
    config.save(&path).unwrap();

    let reloaded = load_config(path.to_str().unwrap()).unwrap();
    assert_eq!(reloaded.device.product_id, 0x0200);
    assert!(reloaded.listen.auto_setup);
    assert_eq!(reloaded.retry.backoff_ms, 200);
}
