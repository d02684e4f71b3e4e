// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawRegistryFile, RegistryFile};
use crate::errors::Result;

/// Read a registry file and deserialize it, without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawRegistryFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<RawRegistryFile> {
    let raw: RawRegistryFile = toml::from_str(contents)?;
    Ok(raw)
}

/// Read, deserialize and validate a registry file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<RegistryFile> {
    let raw = load_from_path(&path)?;
    RegistryFile::try_from(raw)
}

/// Registry file looked up inside the configuration directory when no
/// explicit `--services` path is given.
pub fn default_registry_path(confdir: &Path) -> PathBuf {
    confdir.join("services.toml")
}
