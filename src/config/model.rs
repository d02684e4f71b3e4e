// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Read-only runtime environment shared by the supervisor, the service
/// registry and the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    /// Runtime files (sockets); also the default working directory.
    pub rundir: PathBuf,
    /// Persistent service data.
    pub datadir: PathBuf,
    /// Per-service log files.
    pub logdir: PathBuf,
    /// Log level handed to the services' own loggers.
    pub loglevel: Option<String>,
    /// Control plane listen port.
    pub port: u16,
    /// Control plane listen address; all interfaces when unset.
    pub host: Option<String>,
}

impl Environment {
    /// Base directories, in the order they are created at startup.
    pub fn base_dirs(&self) -> [&Path; 3] {
        [&self.rundir, &self.datadir, &self.logdir]
    }

    /// `host:port` the control plane binds to.
    pub fn listen_addr(&self) -> String {
        let host = self.host.as_deref().unwrap_or("0.0.0.0");
        format!("{}:{}", host, self.port)
    }
}

/// Make `dir` absolute (against the current directory) and prepend `prefix`
/// verbatim.
///
/// The prefix is glued on as a string, so `prefix = "/tmp/root"` and
/// `dir = "/var/run/x"` yields `/tmp/root/var/run/x`.
pub fn prefixed_dir(prefix: &str, dir: &Path) -> PathBuf {
    let absolute = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    if prefix.is_empty() {
        return absolute;
    }
    PathBuf::from(format!("{}{}", prefix, absolute.display()))
}

/// Per-service process option overrides.
///
/// Every field is optional; unset fields fall back to the defaults in
/// [`crate::exec::ProcessOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessOverrides {
    /// Capture stdout/stderr into log files instead of inheriting them.
    #[serde(default)]
    pub silent: Option<bool>,

    /// Maximum number of automatic restarts.
    #[serde(default)]
    pub max_restarts: Option<u32>,

    /// A run shorter than this counts as a "spin".
    #[serde(default)]
    pub min_uptime_ms: Option<u64>,

    /// Pause before restarting a spinning process.
    #[serde(default)]
    pub restart_delay_ms: Option<u64>,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    #[serde(default)]
    pub stdout_log: Option<PathBuf>,

    #[serde(default)]
    pub stderr_log: Option<PathBuf>,

    /// Signal name used for a deliberate stop, e.g. `"SIGINT"`.
    #[serde(default)]
    pub kill_signal: Option<String>,
}

/// Service registry as read from a TOML file, before validation.
///
/// ```toml
/// [shared]
/// connector = { single = true }
///
/// [[service]]
/// name = "cubes"
/// dirs = ["cubes/blob"]
///
/// [service.options]
/// max_restarts = 3
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRegistryFile {
    /// Merged into the shared configuration object before any service is
    /// resolved.
    #[serde(default)]
    pub shared: toml::Table,

    /// Services in start order.
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceEntry>,
}

/// `[[service]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceEntry {
    pub name: String,

    /// Executable name; defaults to `evo-<name>`.
    #[serde(default)]
    pub command: Option<String>,

    /// Extra arguments appended after the generated ones.
    #[serde(default)]
    pub args: Vec<String>,

    /// Directories required before spawn. Relative paths resolve against the
    /// data directory.
    #[serde(default)]
    pub dirs: Vec<PathBuf>,

    /// Per-service configuration merged on top of the shared one.
    #[serde(default)]
    pub config: Option<toml::Table>,

    #[serde(default)]
    pub options: ProcessOverrides,
}

/// Validated service registry.
#[derive(Debug, Clone)]
pub struct RegistryFile {
    pub shared: toml::Table,
    pub services: Vec<ServiceEntry>,
}

impl RegistryFile {
    /// Wrap an already-validated raw registry. Use `TryFrom` everywhere else.
    pub(crate) fn new_unchecked(raw: RawRegistryFile) -> Self {
        Self {
            shared: raw.shared,
            services: raw.services,
        }
    }
}
