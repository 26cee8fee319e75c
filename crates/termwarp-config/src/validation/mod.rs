//! Configuration validation.
//!
//! Each section has its own check; all errors are collected into a single
//! `ConfigError`.

mod helpers;


use termwarp_common::ConfigError;

use crate::schema::TermwarpConfig;
use helpers::{validate_non_empty, validate_range};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &TermwarpConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_server(&mut errors, config);
    validate_session(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_server(errors: &mut Vec<String>, config: &TermwarpConfig) {
    validate_range(errors, "server.port", config.server.port, 1, 65_535);
    validate_non_empty(errors, "server.bind", &config.server.bind);
}

fn validate_session(errors: &mut Vec<String>, config: &TermwarpConfig) {
    validate_range(
        errors,
        "session.queue_capacity",
        config.session.queue_capacity,
        1,
        10_000,
    );
    validate_non_empty(errors, "session.command", &config.session.command);
    validate_non_empty(errors, "session.shell", &config.session.shell);
}
