//! Integration tests for keysend.
//!
//! Tests verify that configuration files drive the engine the way the
//! settings they contain describe.

use keysend::config::{AppConfig, ThreadSettings};
use keysend::{CoordMode, Error, RecordingPlatform, SendMode, Sender};
use std::fs;
use std::path::PathBuf;

/// Returns a unique temporary file path for test isolation.
fn get_test_file_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "keysend_integration_test_{}_{}.toml",
        name,
        std::process::id()
    ));
    path
}

/// Removes a test file if it exists.
fn cleanup_test_file(path: &PathBuf) {
    let _ = fs::remove_file(path);
}

/// Tests configuration save and load cycle preserves data.
#[test]
fn test_config_round_trip() {
    let path = get_test_file_path("round_trip");

    let config = AppConfig {
        key_delay: 25,
        press_duration: 5,
        send_mode: "InputThenPlay".to_string(),
        send_level: 3,
        coord_mode: "Client".to_string(),
        hotkey_modifier_timeout: -1,
        menu_mask_key: "vkE8".to_string(),
        ..AppConfig::default()
    };

    config.save_to_file(&path).expect("Failed to save config");
    let loaded_config = AppConfig::load_from_file(&path).expect("Failed to load config");
    assert_eq!(config, loaded_config);

    cleanup_test_file(&path);
}

/// Tests that a missing file is created with defaults.
#[test]
fn test_load_or_create_writes_defaults() {
    let path = get_test_file_path("create");
    cleanup_test_file(&path);

    let config = AppConfig::load_or_create(&path).expect("Failed to create config");
    assert_eq!(config, AppConfig::default());
    assert!(path.exists());

    let content = fs::read_to_string(&path).expect("Failed to read config");
    assert!(content.contains("send_mode = \"Event\""));
    assert!(content.contains("# Event, Input, Play or InputThenPlay"));

    cleanup_test_file(&path);
}

/// Tests that out-of-range values are clamped on load.
#[test]
fn test_load_clamps_values() {
    let path = get_test_file_path("clamp");
    fs::write(
        &path,
        "send_level = 250\n\
         default_mouse_speed = 400\n\
         key_delay = -30\n\
         max_threads = 0\n",
    )
    .expect("Failed to write config");

    let config = AppConfig::load_from_file(&path).expect("Failed to load config");
    assert_eq!(config.send_level, 100);
    assert_eq!(config.default_mouse_speed, 100);
    assert_eq!(config.key_delay, -1);
    assert_eq!(config.max_threads, 1);

    cleanup_test_file(&path);
}

/// Tests that malformed TOML surfaces as a configuration error.
#[test]
fn test_malformed_config() {
    let path = get_test_file_path("malformed");
    fs::write(&path, "send_mode = [unterminated").expect("Failed to write config");

    let result = AppConfig::load_from_file(&path);
    assert!(matches!(result, Err(Error::Config(_))));

    cleanup_test_file(&path);
}

/// Tests that a loaded config drives the engine's thread settings.
#[test]
fn test_config_drives_sender() {
    let path = get_test_file_path("drives_sender");
    fs::write(
        &path,
        "send_mode = \"Play\"\n\
         coord_mode = \"Window\"\n\
         send_level = 9\n",
    )
    .expect("Failed to write config");

    let config = AppConfig::load_from_file(&path).expect("Failed to load config");
    let settings = ThreadSettings::try_from(&config).expect("Invalid settings");
    assert_eq!(settings.send_mode, SendMode::Play);
    assert_eq!(settings.coord_mode, CoordMode::Window);

    let mut sender =
        Sender::from_config(RecordingPlatform::new(), &config).expect("Failed to build sender");
    sender.send("x").expect("Send failed");
    assert_eq!(sender.platform().flushes().len(), 1);

    cleanup_test_file(&path);
}

/// Tests that a bad disguise key name is rejected when building the engine.
#[test]
fn test_bad_menu_mask_key() {
    let config = AppConfig {
        menu_mask_key: "NotAKey".to_string(),
        ..AppConfig::default()
    };
    assert!(Sender::from_config(RecordingPlatform::new(), &config).is_err());
}
