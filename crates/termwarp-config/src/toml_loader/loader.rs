//! Core TOML config loading: read from path or platform default.

use std::path::Path;

use termwarp_common::ConfigError;
use tracing::{info, warn};

use super::paths::{create_default_config, default_config_path};
use crate::schema::TermwarpConfig;
use crate::validation;

/// Load config from a specific TOML file path.
///
/// Missing fields take their serde defaults. A file that parses but fails
/// validation logs a warning and yields the default config.
pub fn load_from_path(path: &Path) -> Result<TermwarpConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config: TermwarpConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    if let Err(e) = validation::validate(&config) {
        warn!("config validation warning: {e}");
        warn!("falling back to default config");
        return Ok(TermwarpConfig::default());
    }

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from `path`, writing a commented default file there first if
/// nothing exists yet.
pub fn load_or_create(path: &Path) -> Result<TermwarpConfig, ConfigError> {
    match load_from_path(path) {
        Err(ConfigError::FileNotFound(_)) => {
            info!("no config found at {}, creating default", path.display());
            create_default_config(path)?;
            Ok(TermwarpConfig::default())
        }
        other => other,
    }
}

/// Load config from the platform-specific default path.
///
/// On Linux: `~/.config/termwarp/config.toml`
/// On macOS: `~/Library/Application Support/termwarp/config.toml`
pub fn load_default() -> Result<TermwarpConfig, ConfigError> {
    load_or_create(&default_config_path()?)
}
