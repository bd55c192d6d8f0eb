//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;
use std::path::PathBuf;

use fleetlink_domain::FleetLinkError;
use fleetlink_infra::config;
use tempfile::NamedTempFile;

fn write_with_extension(contents: &str, extension: &str) -> (NamedTempFile, PathBuf) {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    (temp_file, path)
}

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "identity": {
            "issuer": "BUSINESSAPI.team",
            "client_id": "BUSINESSAPI.client",
            "key_id": "kid-json",
            "private_key_path": "/etc/fleetlink/key.pem",
            "scope": "business.api"
        },
        "auth": {
            "refresh_buffer_secs": 120,
            "cache_enabled": false
        },
        "http": {
            "base_url": "https://api.test",
            "max_attempts": 4,
            "max_retry_wait_secs": 30
        }
    }"#;

    let (_guard, path) = write_with_extension(json_content, "json");
    let config = config::load_from_file(Some(path.clone())).expect("config from JSON file");

    assert_eq!(config.identity.key_id, "kid-json");
    assert_eq!(config.auth.refresh_buffer_secs, 120);
    assert!(!config.auth.cache_enabled);
    assert_eq!(config.http.base_url, "https://api.test");
    assert_eq!(config.http.max_attempts, 4);
    assert_eq!(config.http.max_retry_wait_secs, 30);
    assert_eq!(config.polling.interval_secs, 5);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_toml_file_resolves_identity() {
    let key_dir = tempfile::tempdir().expect("tempdir");
    let key_path = key_dir.path().join("key.pem");
    std::fs::write(&key_path, fleetlink_common::testing::TEST_EC_PRIVATE_KEY_PEM)
        .expect("write key");

    let toml_content = format!(
        r#"
[identity]
issuer = "BUSINESSAPI.team"
client_id = "BUSINESSAPI.client"
key_id = "kid-toml"
private_key_path = "{}"

[polling]
interval_secs = 1
max_attempts = 3
"#,
        key_path.display()
    );

    let (_guard, path) = write_with_extension(&toml_content, "toml");
    let config = config::load_from_file(Some(path.clone())).expect("config from TOML file");

    assert_eq!(config.polling.max_attempts, 3);
    let identity = config.identity.resolve().expect("identity resolves");
    assert_eq!(identity.key_id(), "kid-toml");
    assert_eq!(identity.scope(), "business.api");
    assert!(identity.private_key_pem().contains("BEGIN PRIVATE KEY"));

    std::fs::remove_file(path).ok();
}

#[test]
fn test_missing_key_file_fails_resolution() {
    let toml_content = r#"
[identity]
issuer = "BUSINESSAPI.team"
client_id = "BUSINESSAPI.client"
key_id = "kid"
private_key_path = "/nonexistent/key.pem"
"#;

    let (_guard, path) = write_with_extension(toml_content, "toml");
    let config = config::load_from_file(Some(path.clone())).expect("file parses");

    let err = config.identity.resolve().expect_err("key file missing");
    assert!(matches!(err, FleetLinkError::Config(ref msg) if msg.contains("/nonexistent/key.pem")));

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_file_not_found() {
    let err = config::load_from_file(Some(PathBuf::from("/nonexistent/fleetlink.toml")))
        .expect_err("Should fail when file not found");
    assert!(matches!(err, FleetLinkError::Config(_)));
}

#[test]
fn test_load_config_invalid_toml() {
    let (_guard, path) = write_with_extension("[identity\nissuer = ", "toml");

    let err = config::load_from_file(Some(path.clone())).expect_err("invalid TOML");
    assert!(matches!(err, FleetLinkError::Config(ref msg) if msg.contains("TOML")));

    std::fs::remove_file(path).ok();
}
