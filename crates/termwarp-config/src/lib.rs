//! termwarp configuration.
//!
//! TOML-based configuration for the observer server, the hijacked session
//! and logging. All sections use defaults so partial configs work out of
//! the box.
//!
//! ```rust,no_run
//! let config = termwarp_config::load_config(None).expect("failed to load config");
//! println!("{}", config.server.port);
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{LogLevel, LoggingConfig, ServerConfig, SessionConfig, TermwarpConfig};

use std::path::Path;

use termwarp_common::ConfigError;

/// Load and validate config from `path`, or from the platform default path
/// when none is given. A missing file is created with the commented defaults.
pub fn load_config(path: Option<&Path>) -> Result<TermwarpConfig, ConfigError> {
    let config = match path {
        Some(path) => toml_loader::load_or_create(path),
        None => toml_loader::load_default(),
    }?;
    validation::validate(&config)?;
    Ok(config)
}
