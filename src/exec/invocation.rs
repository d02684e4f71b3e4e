// src/exec/invocation.rs

//! Turning a [`ServiceDescriptor`] into a concrete process invocation.
//!
//! Defaults and per-service overrides are merged exactly once here; the
//! process layer only ever sees the fully resolved [`ProcessOptions`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use nix::sys::signal::Signal;
use serde_json::Value;

use crate::config::{Environment, ProcessOverrides};
use crate::errors::{Result, SupervisorError};
use crate::registry::ServiceDescriptor;

pub const DEFAULT_MAX_RESTARTS: u32 = 5;
pub const DEFAULT_MIN_UPTIME: Duration = Duration::from_millis(1000);
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_KILL_SIGNAL: Signal = Signal::SIGTERM;

/// Fully resolved process options for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Append stdout/stderr to `stdout_log`/`stderr_log` instead of
    /// inheriting the supervisor's streams.
    pub silent: bool,
    /// Restarts allowed before the handle gives up.
    pub max_restarts: u32,
    /// Runs shorter than this are "spins" and are delayed before restarting.
    pub min_uptime: Duration,
    pub restart_delay: Duration,
    pub cwd: PathBuf,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
    /// Sent on a deliberate stop.
    pub kill_signal: Signal,
}

impl ProcessOptions {
    /// Defaults for a service named `name` in `env`.
    pub fn defaults_for(name: &str, env: &Environment) -> Self {
        Self {
            silent: true,
            max_restarts: DEFAULT_MAX_RESTARTS,
            min_uptime: DEFAULT_MIN_UPTIME,
            restart_delay: DEFAULT_RESTART_DELAY,
            cwd: env.rundir.clone(),
            stdout_log: env.logdir.join(format!("{name}.stdout.log")),
            stderr_log: env.logdir.join(format!("{name}.stderr.log")),
            kill_signal: DEFAULT_KILL_SIGNAL,
        }
    }

    /// Defaults with every set field of `overrides` applied on top.
    pub fn merged(name: &str, env: &Environment, overrides: &ProcessOverrides) -> Result<Self> {
        let mut opts = Self::defaults_for(name, env);

        if let Some(silent) = overrides.silent {
            opts.silent = silent;
        }
        if let Some(max) = overrides.max_restarts {
            opts.max_restarts = max;
        }
        if let Some(ms) = overrides.min_uptime_ms {
            opts.min_uptime = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.restart_delay_ms {
            opts.restart_delay = Duration::from_millis(ms);
        }
        if let Some(ref cwd) = overrides.cwd {
            opts.cwd = cwd.clone();
        }
        if let Some(ref path) = overrides.stdout_log {
            opts.stdout_log = path.clone();
        }
        if let Some(ref path) = overrides.stderr_log {
            opts.stderr_log = path.clone();
        }
        if let Some(ref sig) = overrides.kill_signal {
            opts.kill_signal = Signal::from_str(sig).map_err(|_| {
                SupervisorError::Config(format!(
                    "service '{}' has unknown kill_signal '{}'",
                    name, sig
                ))
            })?;
        }

        Ok(opts)
    }
}

/// Everything needed to spawn (and respawn) one service process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub program: PathBuf,
    /// Passed to the process as-is, one element per argv entry.
    pub args: Vec<String>,
    pub options: ProcessOptions,
}

impl Invocation {
    /// Path of the service's own log file, as passed on its command line.
    pub fn log_file(name: &str, env: &Environment) -> PathBuf {
        env.logdir.join(format!("{name}.log"))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in self.args.iter() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Build the invocation for `desc`.
///
/// Command line layout:
/// `<program> -D .=<shared json> [-D .+=<service json>] --logger-drivers-file-options-filename=<log> [extra args...]`
pub fn build_invocation(
    desc: &ServiceDescriptor,
    shared: &Value,
    env: &Environment,
    bindir: Option<&Path>,
) -> Result<Invocation> {
    let command = desc.command_name();
    let program = match bindir {
        Some(dir) => dir.join(&command),
        None => PathBuf::from(&command),
    };

    let shared_json = serde_json::to_string(shared).map_err(anyhow::Error::from)?;
    let mut args = vec!["-D".to_string(), format!(".={shared_json}")];

    if let Some(ref config) = desc.config {
        let json = serde_json::to_string(config).map_err(anyhow::Error::from)?;
        args.push("-D".to_string());
        args.push(format!(".+={json}"));
    }

    args.push(format!(
        "--logger-drivers-file-options-filename={}",
        Invocation::log_file(&desc.name, env).display()
    ));
    args.extend(desc.args.iter().cloned());

    let options = ProcessOptions::merged(&desc.name, env, &desc.options)?;

    Ok(Invocation {
        name: desc.name.clone(),
        program,
        args,
        options,
    })
}
