//! Logging setup.
//!
//! stdout belongs to the hijacked program, so logs go to a file by default.

use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use termwarp_config::LoggingConfig;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

/// The filter directive: CLI override, then the configured level, then the default.
pub fn directive(cli: Option<&str>, config: &LoggingConfig) -> String {
    match cli {
        Some(level) => level.to_string(),
        None => format!("termwarp={}", config.level.as_directive()),
    }
}

pub fn log_file_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("termwarp").join("logs").join("termwarp.log"))
}

fn open_log_file() -> Option<(File, PathBuf)> {
    let path = log_file_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok()?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .ok()?;
    Some((file, path))
}

/// Install the global subscriber. Returns the log file path when logging to a file.
pub fn init(cli: Option<&str>, config: &LoggingConfig) -> Option<PathBuf> {
    let directive = directive(cli, config);
    let filter = match directive.parse::<Directive>() {
        Ok(d) => EnvFilter::from_default_env().add_directive(d),
        Err(e) => {
            eprintln!("termwarp: invalid log directive {directive:?} ({e}), using info");
            EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into())
        }
    };

    if config.file_logging {
        if let Some((file, path)) = open_log_file() {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
            return Some(path);
        }
        eprintln!("termwarp: could not open log file, logging to stderr");
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use termwarp_config::LogLevel;

    #[test]
    fn cli_level_wins() {
        let config = LoggingConfig::default();
        assert_eq!(directive(Some("debug"), &config), "debug");
    }

    #[test]
    fn config_level_used_without_cli() {
        let config = LoggingConfig {
            level: LogLevel::Warning,
            file_logging: false,
        };
        assert_eq!(directive(None, &config), "termwarp=warn");
    }

    #[test]
    fn default_directive_parses() {
        let directive = directive(None, &LoggingConfig::default());
        assert_eq!(directive, "termwarp=info");
        assert!(directive.parse::<Directive>().is_ok());
    }
}
