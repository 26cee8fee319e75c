//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# termwarp configuration
# Only override what you want to change -- missing fields use defaults.

[server]
# bind = "0.0.0.0"
# port = 8080            # 1-65535

[session]
# command = "claude"     # run as `<shell> -c <command>`
# shell = "sh"
# queue_capacity = 100   # 1-10000 pending remote lines

[logging]
# level = "INFO"         # DEBUG, INFO, WARNING, ERROR
# file_logging = true    # false logs to stderr
"##
    .to_string()
}
