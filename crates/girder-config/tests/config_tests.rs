//! Integration tests for configuration discovery and environment overrides

use girder_config::{BridgeConfig, ConfigError, CONFIG_FILE_NAME};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &std::path::Path, contents: &str) {
    fs::write(dir.join(CONFIG_FILE_NAME), contents).unwrap();
}

#[test]
fn test_discover_in_start_directory() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "[native]\naccess = true\n");

    let config = BridgeConfig::discover(dir.path()).unwrap();
    assert!(config.native.access_granted());
}

#[test]
fn test_discover_walks_up_directory_tree() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "[native]\naccess = true\nname = \"sample\"\n");

    let nested = dir.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();

    let config = BridgeConfig::discover(&nested).unwrap();
    assert_eq!(config.native.name.as_deref(), Some("sample"));
}

#[test]
fn test_discover_not_found() {
    let dir = TempDir::new().unwrap();
    // Walking up from a temp dir eventually reaches the filesystem root;
    // no girder.toml should exist anywhere along that chain in CI.
    let nested = dir.path().join("empty");
    fs::create_dir_all(&nested).unwrap();

    match BridgeConfig::discover(&nested) {
        Err(ConfigError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_load_from_file_invalid_toml() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "[native\naccess = true\n");

    let result = BridgeConfig::load_from_file(&dir.path().join(CONFIG_FILE_NAME));
    assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
}

#[test]
#[serial]
fn test_env_override_grants_access() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "[native]\naccess = false\n");

    env::set_var("GIRDER_NATIVE_ACCESS", "1");
    let config = BridgeConfig::discover(dir.path()).unwrap();
    env::remove_var("GIRDER_NATIVE_ACCESS");

    assert!(config.native.access_granted());
}

#[test]
#[serial]
fn test_env_override_revokes_access() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "[native]\naccess = true\n");

    env::set_var("GIRDER_NATIVE_ACCESS", "false");
    let config = BridgeConfig::discover(dir.path()).unwrap();
    env::remove_var("GIRDER_NATIVE_ACCESS");

    assert!(!config.native.access_granted());
}

#[test]
#[serial]
fn test_env_override_invalid_value() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "[native]\naccess = true\n");

    env::set_var("GIRDER_NATIVE_ACCESS", "maybe");
    let result = BridgeConfig::discover(dir.path());
    env::remove_var("GIRDER_NATIVE_ACCESS");

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
#[serial]
fn test_env_override_artifact_path() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "[native]\naccess = true\n");

    env::set_var("GIRDER_ARTIFACT", "/opt/override/libgirder.so");
    let config = BridgeConfig::discover(dir.path()).unwrap();
    env::remove_var("GIRDER_ARTIFACT");

    assert_eq!(
        config.native.artifact.as_deref(),
        Some(std::path::Path::new("/opt/override/libgirder.so"))
    );
}
