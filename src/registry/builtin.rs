// src/registry/builtin.rs

//! The services shipped with pocket-cloud, in start order.

use std::path::Path;

use serde_json::{json, Value};

use crate::config::Environment;
use crate::registry::{ConfigureFn, ServiceDescriptor};

pub fn builtin_services() -> Vec<ConfigureFn> {
    vec![
        configure_connector,
        configure_cubes,
        configure_ambience,
        configure_governor,
        configure_launcher,
    ]
}

fn configure_connector(config: &mut Value, _env: &Environment) -> ServiceDescriptor {
    config["connector"] = json!({ "single": true });
    ServiceDescriptor::new("connector")
}

fn configure_cubes(config: &mut Value, env: &Environment) -> ServiceDescriptor {
    let base = env.datadir.join("cubes");
    let blob = base.join("blob");
    let cache = base.join("cache");

    config["cubes"] = json!({
        "engines": {
            "entity": {
                "name": "tingodb",
                "file": lossy(&base.join("entity.db")),
            },
            "blob": {
                "name": "filesystem",
                "path": lossy(&blob),
            },
        },
        "cachedir": lossy(&cache),
    });

    ServiceDescriptor::new("cubes").with_dirs(vec![blob, cache])
}

fn configure_ambience(_config: &mut Value, _env: &Environment) -> ServiceDescriptor {
    ServiceDescriptor::new("ambience")
}

fn configure_governor(_config: &mut Value, _env: &Environment) -> ServiceDescriptor {
    ServiceDescriptor::new("governor")
}

fn configure_launcher(_config: &mut Value, _env: &Environment) -> ServiceDescriptor {
    ServiceDescriptor::new("launcher")
}

fn lossy(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
