// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `pocket-cloud-server`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pocket-cloud-server",
    version,
    about = "Start, supervise and stop the pocket cloud services.",
    long_about = None
)]
pub struct CliArgs {
    /// String prepended verbatim to every directory below.
    #[arg(long, value_name = "PREFIX", default_value = "")]
    pub prefix: String,

    #[arg(long, value_name = "DIR", default_value = "/var/log/pocket-cloud")]
    pub logdir: PathBuf,

    #[arg(long, value_name = "DIR", default_value = "/var/run/pocket-cloud")]
    pub rundir: PathBuf,

    #[arg(long, value_name = "DIR", default_value = "/var/lib/pocket-cloud")]
    pub datadir: PathBuf,

    /// Where `services.toml` is looked up when `--services` is not given.
    #[arg(long, value_name = "DIR", default_value = "/etc/pocket-cloud")]
    pub confdir: PathBuf,

    /// Log level passed to the services (not the supervisor's own level).
    #[arg(long, value_name = "LEVEL", default_value = "notice")]
    pub loglevel: String,

    /// Control plane port.
    #[arg(
        long,
        value_name = "PORT",
        default_value_t = 3080,
        value_parser = clap::value_parser!(u16).range(1..=65535)
    )]
    pub port: u16,

    /// Control plane listen address (default: all interfaces).
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Service registry (TOML). Falls back to `<confdir>/services.toml`, then
    /// to the built-in services.
    #[arg(long, value_name = "PATH")]
    pub services: Option<PathBuf>,

    /// Directory holding the service executables. Uses `PATH` when omitted.
    #[arg(long, value_name = "DIR")]
    pub bindir: Option<PathBuf>,

    /// Static assets served by the control plane.
    #[arg(long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Seconds to wait for services to stop before giving up on them.
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub shutdown_timeout: u64,

    /// Supervisor logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `POCKET_CLOUD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print every service invocation, but start nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
