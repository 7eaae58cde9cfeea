//! Unit tests for configuration resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate NPMS_CONFIG are marked with #[serial].

mod helpers;

use helpers::log_capture::LogCapture;
use npms_common::config::{
    load_toml_config, write_toml_config, ConfigResolver, ConfigSource, TomlConfig, CONFIG_ENV_VAR,
};
use npms_common::Error;
use serial_test::serial;
use std::env;
use tempfile::TempDir;

fn isolated_resolver(temp_dir: &TempDir) -> ConfigResolver {
    ConfigResolver::with_locations(
        Some(temp_dir.path().join("user")),
        Some(temp_dir.path().join("system").join("npms.toml")),
    )
}

#[test]
#[serial]
fn test_no_config_uses_compiled_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();

    let (config, source) = isolated_resolver(&temp_dir).resolve(None).unwrap();

    assert_eq!(source, ConfigSource::CompiledDefaults);
    assert_eq!(config, TomlConfig::default());
}

#[test]
#[serial]
fn test_cli_argument_wins_over_environment() {
    let temp_dir = TempDir::new().unwrap();
    let cli_path = temp_dir.path().join("cli.toml");
    let env_path = temp_dir.path().join("env.toml");

    let mut cli_config = TomlConfig::default();
    cli_config.queue.name = "from-cli".to_string();
    write_toml_config(&cli_config, &cli_path).unwrap();

    let mut env_config = TomlConfig::default();
    env_config.queue.name = "from-env".to_string();
    write_toml_config(&env_config, &env_path).unwrap();

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let (config, source) = isolated_resolver(&temp_dir).resolve(Some(&cli_path)).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(source, ConfigSource::CommandLine(cli_path));
    assert_eq!(config.queue.name, "from-cli");
}

#[test]
#[serial]
fn test_environment_wins_over_user_file() {
    let temp_dir = TempDir::new().unwrap();
    let env_path = temp_dir.path().join("env.toml");
    let user_path = temp_dir.path().join("user").join("npms.toml");

    let mut env_config = TomlConfig::default();
    env_config.enqueue_missing.concurrency = 3;
    write_toml_config(&env_config, &env_path).unwrap();
    write_toml_config(&TomlConfig::default(), &user_path).unwrap();

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let (config, source) = isolated_resolver(&temp_dir).resolve(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(source, ConfigSource::Environment(env_path));
    assert_eq!(config.enqueue_missing.concurrency, 3);
}

#[test]
#[serial]
fn test_user_file_wins_over_system_file() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let user_path = temp_dir.path().join("user").join("npms.toml");
    let system_path = temp_dir.path().join("system").join("npms.toml");

    let mut user_config = TomlConfig::default();
    user_config.logging.level = "debug".to_string();
    write_toml_config(&user_config, &user_path).unwrap();
    write_toml_config(&TomlConfig::default(), &system_path).unwrap();

    let (config, source) = isolated_resolver(&temp_dir).resolve(None).unwrap();

    assert_eq!(source, ConfigSource::UserFile(user_path));
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    let result = isolated_resolver(&temp_dir).resolve(Some(&missing));

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_invalid_toml_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[couchdb\nnpm_addr = ").unwrap();

    assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
}

#[test]
fn test_write_then_load_preserves_blacklist() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("npms.toml");

    let mut config = TomlConfig::default();
    config
        .blacklist
        .insert("hooks-cli".to_string(), "causes the analyzer to hang".to_string());
    write_toml_config(&config, &path).unwrap();

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
#[serial]
fn test_resolution_does_not_log() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let user_path = temp_dir.path().join("user").join("npms.toml");
    write_toml_config(&TomlConfig::default(), &user_path).unwrap();

    let capture = LogCapture::new();
    let resolver = isolated_resolver(&temp_dir);
    capture.scoped(|| resolver.resolve(None)).unwrap();
    std::fs::remove_file(&user_path).unwrap();
    capture.scoped(|| resolver.resolve(None)).unwrap();

    assert!(capture.records().is_empty(), "unexpected events: {:?}", capture.records());
}
