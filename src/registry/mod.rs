// src/registry/mod.rs

//! Service registry: turns a static list of service definitions into
//! [`ServiceDescriptor`]s.
//!
//! Definitions are applied in registry order against one shared
//! configuration object. Each definition may mutate that object before
//! returning its own descriptor, so settings injected by an earlier service
//! are visible to later ones (and to every service's command line).

pub mod builtin;

use std::path::PathBuf;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::{validate_service_names, Environment, ProcessOverrides, RegistryFile};
use crate::errors::Result;

pub use builtin::builtin_services;

/// A built-in service definition.
pub type ConfigureFn = fn(&mut Value, &Environment) -> ServiceDescriptor;

/// Immutable description of one service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    /// Unique key.
    pub name: String,
    /// Executable name; `evo-<name>` when unset.
    pub command: Option<String>,
    /// Extra arguments appended after the generated ones.
    pub args: Vec<String>,
    /// Per-service configuration merged on top of the shared one.
    pub config: Option<Value>,
    /// Directories that must exist before the process is spawned.
    pub dirs: Vec<PathBuf>,
    pub options: ProcessOverrides,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: None,
            args: Vec::new(),
            config: None,
            dirs: Vec::new(),
            options: ProcessOverrides::default(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.dirs = dirs;
        self
    }

    pub fn with_options(mut self, options: ProcessOverrides) -> Self {
        self.options = options;
        self
    }

    /// Executable name before `bindir` resolution.
    pub fn command_name(&self) -> String {
        self.command
            .clone()
            .unwrap_or_else(|| format!("evo-{}", self.name))
    }
}

/// Where service definitions come from.
#[derive(Debug, Clone)]
pub enum RegistrySource {
    Builtin,
    File(RegistryFile),
    /// Pre-built descriptors, applied as-is (used by embedders and tests).
    Descriptors(Vec<ServiceDescriptor>),
}

/// Initial shared configuration handed to every service.
///
/// `${name}` in the socket path is expanded by each service itself.
pub fn shared_config(env: &Environment) -> Value {
    let mut logger = Map::new();
    if let Some(ref level) = env.loglevel {
        logger.insert("level".to_string(), json!(level));
    }
    logger.insert(
        "drivers".to_string(),
        json!({
            "file": {
                "driver": "file",
                "options": {},
            }
        }),
    );

    json!({
        "neuron": {
            "dendrite": {
                "sock": env.rundir.join("neuron-${name}.sock").to_string_lossy(),
            }
        },
        "logger": Value::Object(logger),
    })
}

/// Apply every definition of `source` in order and collect the descriptors.
pub fn resolve(
    source: &RegistrySource,
    shared: &mut Value,
    env: &Environment,
) -> Result<Vec<ServiceDescriptor>> {
    let descriptors = match source {
        RegistrySource::Builtin => builtin_services()
            .into_iter()
            .map(|configure| configure(shared, env))
            .collect(),
        RegistrySource::File(file) => resolve_file(file, shared, env)?,
        RegistrySource::Descriptors(list) => list.clone(),
    };

    let names: Vec<&str> = descriptors.iter().map(|d: &ServiceDescriptor| d.name.as_str()).collect();
    validate_service_names(names.iter().copied())?;
    debug!(?names, "resolved service descriptors");

    Ok(descriptors)
}

fn resolve_file(
    file: &RegistryFile,
    shared: &mut Value,
    env: &Environment,
) -> Result<Vec<ServiceDescriptor>> {
    let patch = serde_json::to_value(&file.shared).map_err(anyhow::Error::from)?;
    merge_json(shared, patch);

    let mut out = Vec::with_capacity(file.services.len());
    for entry in file.services.iter() {
        let config = match entry.config {
            Some(ref table) => Some(serde_json::to_value(table).map_err(anyhow::Error::from)?),
            None => None,
        };

        let dirs = entry
            .dirs
            .iter()
            .map(|d| {
                if d.is_absolute() {
                    d.clone()
                } else {
                    env.datadir.join(d)
                }
            })
            .collect();

        out.push(ServiceDescriptor {
            name: entry.name.clone(),
            command: entry.command.clone(),
            args: entry.args.clone(),
            config,
            dirs,
            options: entry.options.clone(),
        });
    }
    Ok(out)
}

/// Recursively merge `patch` into `target`. Objects merge key by key; any
/// other value replaces what was there.
pub fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}
