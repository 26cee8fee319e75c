//! Tests for TOML config loading, creation, and path resolution.

use super::template::default_config_toml;
use super::*;
use crate::schema::TermwarpConfig;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_termwarp_config.toml"));
    let err = result.unwrap_err();
    assert!(matches!(err, termwarp_common::ConfigError::FileNotFound(_)));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[server]
port = 9000

[session]
command = "bash -l"
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.session.command, "bash -l");
    // Defaults preserved
    assert_eq!(config.server.bind, "0.0.0.0");
    assert_eq!(config.session.queue_capacity, 100);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, termwarp_common::ConfigError::ParseError(_)));
}

#[test]
fn load_config_with_invalid_values_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[session]
queue_capacity = 0
command = "vim"
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.session.queue_capacity, 100);
    assert_eq!(config.session.command, "claude");
}

#[test]
fn load_or_create_writes_default_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    assert!(!path.exists());

    let config = load_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config.server.port, 8080);

    // A second load reads the file that was just written.
    let again = load_or_create(&path).unwrap();
    assert_eq!(again.session.command, "claude");
}

#[test]
fn default_template_parses_to_defaults() {
    let config: TermwarpConfig = toml::from_str(&default_config_toml()).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.session.shell, "sh");
}

#[test]
fn default_config_path_ends_with_termwarp() {
    if let Ok(path) = default_config_path() {
        assert!(path.ends_with("termwarp/config.toml"));
    }
}
