//! Where the config file lives, and writing the first one.

use std::fs;
use std::path::{Path, PathBuf};

use termwarp_common::ConfigError;

use super::template::default_config_toml;

/// `<config_dir>/termwarp/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("termwarp").join("config.toml"))
        .ok_or_else(|| ConfigError::ParseError("no platform config directory".into()))
}

fn write_error(what: &str, path: &Path, e: std::io::Error) -> ConfigError {
    ConfigError::ParseError(format!("{what} {}: {e}", path.display()))
}

/// Write the commented default config to `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| write_error("cannot create", dir, e))?;
    }
    fs::write(path, default_config_toml()).map_err(|e| write_error("cannot write", path, e))?;
    tracing::info!(path = %path.display(), "Wrote default config");
    Ok(())
}
