// src/config/validate.rs

use std::collections::HashSet;
use std::str::FromStr;

use nix::sys::signal::Signal;

use crate::config::model::{RawRegistryFile, RegistryFile, ServiceEntry};
use crate::errors::{Result, SupervisorError};

impl TryFrom<RawRegistryFile> for RegistryFile {
    type Error = SupervisorError;

    fn try_from(raw: RawRegistryFile) -> std::result::Result<Self, Self::Error> {
        validate_registry(&raw)?;
        Ok(RegistryFile::new_unchecked(raw))
    }
}

/// Check a raw registry without consuming it.
pub fn validate_registry(cfg: &RawRegistryFile) -> Result<()> {
    ensure_has_services(cfg)?;
    validate_names(cfg)?;
    for entry in cfg.services.iter() {
        validate_options(entry)?;
    }
    Ok(())
}

fn ensure_has_services(cfg: &RawRegistryFile) -> Result<()> {
    if cfg.services.is_empty() {
        return Err(SupervisorError::Config(
            "registry must contain at least one [[service]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_names(cfg: &RawRegistryFile) -> Result<()> {
    validate_service_names(cfg.services.iter().map(|entry| entry.name.as_str()))
}

/// Names must be non-empty, free of path separators and unique.
pub fn validate_service_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();

    for name in names {
        if name.trim().is_empty() {
            return Err(SupervisorError::Config(
                "service name must not be empty".to_string(),
            ));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(SupervisorError::Config(format!(
                "service name '{}' must not contain path separators",
                name
            )));
        }
        if !seen.insert(name) {
            return Err(SupervisorError::Config(format!(
                "duplicate service name '{}'",
                name
            )));
        }
    }
    Ok(())
}

fn validate_options(entry: &ServiceEntry) -> Result<()> {
    if let Some(ref sig) = entry.options.kill_signal {
        if Signal::from_str(sig).is_err() {
            return Err(SupervisorError::Config(format!(
                "service '{}' has unknown kill_signal '{}'",
                entry.name, sig
            )));
        }
    }
    if let Some(ref command) = entry.command {
        if command.trim().is_empty() {
            return Err(SupervisorError::Config(format!(
                "service '{}' has an empty command",
                entry.name
            )));
        }
    }
    Ok(())
}
