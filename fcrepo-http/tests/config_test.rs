//! Client configuration file tests

use fcrepo_http::{connect, ClientConfig};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fedora.toml");
    fs::write(
        &path,
        "url = \"http://repo.example.org:8080/fedora/\"\nuser = \"fedoraAdmin\"\npassword = \"fedoraAdmin\"\ntimeout_secs = 30\n",
    )
    .unwrap();

    let config = ClientConfig::load(&path).unwrap();
    assert_eq!(config.url, "http://repo.example.org:8080/fedora/");
    assert_eq!(config.user.as_deref(), Some("fedoraAdmin"));
    assert_eq!(config.timeout_secs, 30);
    assert_eq!(
        config.base_url().unwrap().as_str(),
        "http://repo.example.org:8080/fedora/"
    );
}

#[test]
fn test_missing_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = ClientConfig::load(&temp_dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, ClientConfig::default());
}

#[test]
fn test_malformed_file_reports_path() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    fs::write(&path, "timeout_secs = \"never\"\n").unwrap();

    let err = ClientConfig::load(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("broken.toml"));
}

#[test]
fn test_file_then_environment() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fedora.toml");
    fs::write(&path, "url = \"http://file/fedora\"\nuser = \"file-user\"\n").unwrap();

    let config = ClientConfig::load(&path)
        .unwrap()
        .with_env_from(|key| (key == "FEDORA_USER").then(|| "env-user".to_string()))
        .unwrap();
    assert_eq!(config.url, "http://file/fedora");
    assert_eq!(config.user.as_deref(), Some("env-user"));
}

#[test]
fn test_connect_builds_api() {
    let config = ClientConfig::default();
    assert!(connect(&config).is_ok());
}
