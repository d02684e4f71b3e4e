#![allow(dead_code)]

use std::path::{Path, PathBuf};

use pocket_cloud_server::config::{Environment, ProcessOverrides};
use pocket_cloud_server::registry::{RegistrySource, ServiceDescriptor};

/// Builder for `Environment` rooted in a test directory.
pub struct EnvironmentBuilder {
    env: Environment,
}

impl EnvironmentBuilder {
    /// `run`, `data` and `log` under `root`; port 3080; no host.
    pub fn new(root: &Path) -> Self {
        Self {
            env: Environment {
                rundir: root.join("run"),
                datadir: root.join("data"),
                logdir: root.join("log"),
                loglevel: None,
                port: 3080,
                host: None,
            },
        }
    }

    pub fn loglevel(mut self, level: &str) -> Self {
        self.env.loglevel = Some(level.to_string());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.env.port = port;
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.env.host = Some(host.to_string());
        self
    }

    pub fn build(self) -> Environment {
        self.env
    }
}

/// Builder for a `ServiceDescriptor` with test-friendly process options.
pub struct ServiceBuilder {
    desc: ServiceDescriptor,
}

impl ServiceBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            desc: ServiceDescriptor::new(name),
        }
    }

    pub fn command(mut self, command: &str) -> Self {
        self.desc.command = Some(command.to_string());
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.desc.args.push(arg.to_string());
        self
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.desc.dirs.push(dir.into());
        self
    }

    pub fn options(mut self, options: ProcessOverrides) -> Self {
        self.desc.options = options;
        self
    }

    pub fn build(self) -> ServiceDescriptor {
        self.desc
    }
}

/// Plain descriptors for `names`, in order.
pub fn registry_of(names: &[&str]) -> RegistrySource {
    RegistrySource::Descriptors(names.iter().map(|n| ServiceDescriptor::new(*n)).collect())
}
