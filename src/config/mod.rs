// src/config/mod.rs

//! Configuration for the supervisor.
//!
//! Responsibilities:
//! - The runtime [`Environment`] record and path prefixing (`model.rs`).
//! - The TOML-backed service registry model (`model.rs`).
//! - Loading a registry from disk (`loader.rs`).
//! - Validating names and process options (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_registry_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    prefixed_dir, Environment, ProcessOverrides, RawRegistryFile, RegistryFile, ServiceEntry,
};
pub use validate::{validate_registry, validate_service_names};
