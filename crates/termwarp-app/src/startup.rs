//! Pre-session helpers: picking the command and printing the banner.

use termwarp_config::TermwarpConfig;
use termwarp_session::SessionCommand;

/// Proxy variables the banner calls out by name.
const BANNER_PROXY_VARS: &[&str] = &[
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "http_proxy",
    "https_proxy",
    "all_proxy",
    "no_proxy",
];

/// The trailing CLI command runs directly; otherwise `session.command` runs
/// through `session.shell -c`.
pub fn session_command(cli_command: &[String], config: &TermwarpConfig) -> SessionCommand {
    match cli_command.split_first() {
        Some((program, args)) => SessionCommand::new(program).args(args),
        None => SessionCommand::shell(&config.session.shell, &config.session.command),
    }
}

/// URL a local browser can use to reach the observer page.
pub fn observer_url(config: &TermwarpConfig) -> String {
    let host = match config.server.bind.as_str() {
        "0.0.0.0" | "::" | "[::]" => "localhost",
        other => other,
    };
    format!("http://{host}:{}", config.server.port)
}

pub fn print_banner(config: &TermwarpConfig, command: &SessionCommand) {
    eprintln!("termwarp v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("  session:  {}", command.display());
    eprintln!("  observer: {}", observer_url(config));

    let proxies: Vec<(String, String)> = command
        .proxy_vars()
        .into_iter()
        .filter(|(k, _)| BANNER_PROXY_VARS.contains(&k.as_str()))
        .collect();
    if proxies.is_empty() {
        eprintln!("  proxy:    none detected");
    } else {
        for (key, value) in &proxies {
            eprintln!("  proxy:    {key}={value}");
        }
    }
    eprintln!("  press Ctrl-C to end the session\n");
}

pub fn log_proxy_environment(command: &SessionCommand) {
    for (key, value) in command.proxy_vars() {
        tracing::info!(key = %key, value = %value, "Inherited proxy variable");
    }
}
