mod cli;
mod logging;
mod signals;
mod startup;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use termwarp_common::{ConfigError, WarpError};
use termwarp_config::{validation, TermwarpConfig};
use termwarp_session::{
    apply_geometry, current_geometry, watch_geometry, BroadcastHub, IoRelay, LifecycleCoordinator,
    LifecycleState, PtySession, RawTerminalGuard, RemoteInputQueue, Resize, SessionInput,
    ShutdownTrigger, Terminate,
};
use termwarp_web::AppState;
use tokio_util::sync::CancellationToken;

const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        // Release builds abort on panic, so guards never get to drop.
        let _ = crossterm::terminal::disable_raw_mode();
        eprintln!("\r\n--- termwarp crashed ---\r");
        default_hook(info);
    }));
}

/// File config with command-line overrides applied on top.
fn load_config(args: &cli::Args) -> Result<TermwarpConfig, ConfigError> {
    let mut config = termwarp_config::load_config(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("termwarp: config load failed, using defaults: {e}");
        TermwarpConfig::default()
    });

    args.apply(&mut config);
    validation::validate(&config)?;
    Ok(config)
}

fn main() {
    install_panic_hook();
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            eprintln!("termwarp: {e}");
            1
        }
    };
    std::process::exit(code);
}

fn run() -> termwarp_common::Result<i32> {
    let args = cli::parse();
    let config = load_config(&args)?;

    let log_file = logging::init(args.log_level.as_deref(), &config.logging);
    tracing::info!("termwarp v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(ref path) = args.config {
        tracing::info!("Using config override: {}", path.display());
    }

    let command = startup::session_command(&args.command, &config);
    startup::print_banner(&config, &command);
    if let Some(ref path) = log_file {
        eprintln!("  logs:     {}\n", path.display());
    }
    startup::log_proxy_environment(&command);

    // Shared core state.
    let hub = Arc::new(BroadcastHub::new());
    let (queue, receiver) = RemoteInputQueue::new(config.session.queue_capacity as usize);
    let queue = Arc::new(queue);
    let lifecycle = Arc::new(LifecycleCoordinator::new(Arc::clone(&queue)));

    // Session. Nothing has touched the terminal yet, so failing here is safe.
    let initial = current_geometry().unwrap_or_default();
    let session = Arc::new(PtySession::start(&command, initial)?);
    lifecycle.attach_session(Arc::clone(&session) as Arc<dyn Terminate>);
    apply_geometry(session.as_ref(), &hub, current_geometry());

    // Past this point the subprocess is running; failures must reap it.
    let startup_failed = |e: WarpError| {
        lifecycle.shutdown(ShutdownTrigger::StartupFailed);
        e
    };

    let reader = session
        .take_reader()
        .ok_or_else(|| WarpError::Other("session output is unavailable".into()))
        .map_err(startup_failed)?;

    // Async side: observer server, geometry listener, signal listener.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("termwarp-rt")
        .build()
        .map_err(|e| startup_failed(e.into()))?;

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = runtime
        .block_on(tokio::net::TcpListener::bind(&addr))
        .map_err(|e| startup_failed(WarpError::Other(format!("cannot listen on {addr}: {e}"))))?;
    let local_addr: Option<SocketAddr> = listener.local_addr().ok();

    // Observers stay connected until cleanup has finished.
    let web_shutdown = CancellationToken::new();
    let web_state = AppState::new(Arc::clone(&hub), Arc::clone(&queue), web_shutdown.clone());
    runtime.spawn(async move {
        if let Err(e) = termwarp_web::serve(listener, web_state).await {
            tracing::error!(error = %e, "Observer server failed");
        }
    });

    {
        let target = Arc::clone(&session) as Arc<dyn Resize>;
        let hub = Arc::clone(&hub);
        let token = lifecycle.geometry_token();
        runtime.spawn(async move {
            if let Err(e) = watch_geometry(target, hub, token).await {
                tracing::warn!(error = %e, "Geometry listener failed");
            }
        });
    }

    {
        let lifecycle = Arc::clone(&lifecycle);
        runtime.spawn(async move {
            match signals::wait_for_termination().await {
                Ok(signal) => {
                    tracing::info!(signal, "Termination signal received");
                    // Cleanup blocks on the subprocess exiting.
                    let _ = tokio::task::spawn_blocking(move || {
                        lifecycle.shutdown(ShutdownTrigger::Signal)
                    })
                    .await;
                }
                Err(e) => tracing::warn!(error = %e, "Signal listener failed"),
            }
        });
    }

    // Raw mode. From here on every exit goes through the coordinator.
    match RawTerminalGuard::acquire() {
        Ok(guard) => lifecycle.attach_terminal(guard),
        Err(e) => {
            let e = startup_failed(e.into());
            web_shutdown.cancel();
            runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
            return Err(e);
        }
    }

    let relay = IoRelay::new(
        Arc::clone(&session) as Arc<dyn SessionInput>,
        Arc::clone(&hub),
        Arc::clone(&lifecycle),
    );
    let spawned = relay
        .spawn_output(reader, std::io::stdout())
        .and_then(|_| relay.spawn_local_input(std::io::stdin()))
        .and_then(|_| relay.spawn_remote_input(receiver));
    let remote = match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::error!(error = %e, "Failed to spawn relay threads");
            lifecycle.shutdown(ShutdownTrigger::StartupFailed);
            None
        }
    };
    tracing::info!(observer = ?local_addr, "Relay running");

    let trigger = lifecycle.wait_terminated();
    if let Some(handle) = remote {
        // Ends once the closed queue is drained.
        let _ = handle.join();
    }

    match trigger {
        Some(ShutdownTrigger::SessionEnded) => eprintln!("\r\ntermwarp: session ended"),
        Some(trigger) => eprintln!("\r\ntermwarp: stopped by {trigger}"),
        None => eprintln!("\r\ntermwarp: stopped"),
    }

    web_shutdown.cancel();
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    debug_assert_eq!(lifecycle.state(), LifecycleState::Terminated);

    let code = lifecycle.exit_code().unwrap_or(0);
    tracing::info!(exit_code = code, "Shutdown complete");
    Ok(i32::try_from(code).unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn args(extra: &[&str], config_path: &std::path::Path) -> cli::Args {
        let mut argv = vec!["termwarp", "--config", config_path.to_str().unwrap()];
        argv.extend_from_slice(extra);
        cli::Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn config_file_is_read_through_crate_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9292\n").unwrap();

        let config = load_config(&args(&[], &path)).unwrap();
        assert_eq!(config.server.port, 9292);
    }

    #[test]
    fn command_line_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9292\n").unwrap();

        let config = load_config(&args(&["--port", "9393"], &path)).unwrap();
        assert_eq!(config.server.port, 9393);
    }

    #[test]
    fn invalid_override_is_a_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let err = load_config(&args(&["--queue-capacity", "0"], &path)).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(WarpError::from(err).to_string().contains("session.queue_capacity"));
    }
}
