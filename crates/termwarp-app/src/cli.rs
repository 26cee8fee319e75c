use std::path::PathBuf;

use clap::Parser;
use termwarp_config::TermwarpConfig;

/// termwarp: run an interactive program and let a browser watch and type along.
#[derive(Parser, Debug)]
#[command(name = "termwarp", version, about)]
pub struct Args {
    /// Observer server port.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Observer server bind address.
    #[arg(long)]
    pub bind: Option<String>,

    /// Remote input queue capacity.
    #[arg(long)]
    pub queue_capacity: Option<u32>,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Program to hijack, with its arguments. Defaults to `session.command`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Args {
    /// Overlay command-line values onto the loaded config.
    pub fn apply(&self, config: &mut TermwarpConfig) {
        if let Some(port) = self.port {
            config.server.port = u32::from(port);
        }
        if let Some(ref bind) = self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(capacity) = self.queue_capacity {
            config.session.queue_capacity = capacity;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
