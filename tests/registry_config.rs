// tests/registry_config.rs

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::tempdir;

use pocket_cloud_server::config::{
    default_registry_path, load_and_validate, load_from_str, prefixed_dir, RegistryFile,
};
use pocket_cloud_server::errors::SupervisorError;
use pocket_cloud_server::registry::{merge_json, resolve, shared_config, RegistrySource};

use crate::common::builders::{EnvironmentBuilder, ServiceBuilder};

const FULL_REGISTRY: &str = r#"
[shared]
connector = { single = true }

[[service]]
name = "cubes"
command = "evo-cubes"
args = ["--verbose"]
dirs = ["cubes/blob", "/abs/cache"]

[service.config]
cachedir = "/tmp/cache"

[service.options]
max_restarts = 3
min_uptime_ms = 500
restart_delay_ms = 200
cwd = "/tmp"
silent = false
kill_signal = "SIGINT"

[[service]]
name = "governor"
"#;

fn validate(contents: &str) -> Result<RegistryFile, SupervisorError> {
    RegistryFile::try_from(load_from_str(contents)?)
}

fn assert_config_error(contents: &str, needle: &str) {
    match validate(contents) {
        Err(SupervisorError::Config(msg)) => {
            assert!(msg.contains(needle), "unexpected message: {msg}");
        }
        other => panic!("expected config error containing '{needle}', got {other:?}"),
    }
}

#[test]
fn full_registry_parses() {
    let file = validate(FULL_REGISTRY).unwrap();

    assert_eq!(file.services.len(), 2);
    let cubes = &file.services[0];
    assert_eq!(cubes.name, "cubes");
    assert_eq!(cubes.command.as_deref(), Some("evo-cubes"));
    assert_eq!(cubes.args, vec!["--verbose"]);
    assert_eq!(cubes.options.max_restarts, Some(3));
    assert_eq!(cubes.options.kill_signal.as_deref(), Some("SIGINT"));
    assert_eq!(cubes.options.silent, Some(false));

    let governor = &file.services[1];
    assert!(governor.command.is_none());
    assert!(governor.options.max_restarts.is_none());
}

#[test]
fn empty_registry_is_rejected() {
    assert_config_error("[shared]\n", "at least one");
}

#[test]
fn duplicate_names_are_rejected() {
    assert_config_error(
        "[[service]]\nname = \"a\"\n[[service]]\nname = \"a\"\n",
        "duplicate service name 'a'",
    );
}

#[test]
fn duplicate_descriptor_names_are_rejected_on_resolve() {
    let env = EnvironmentBuilder::new(Path::new("/pc")).build();
    let mut shared = shared_config(&env);
    let source = RegistrySource::Descriptors(vec![
        ServiceBuilder::new("a").build(),
        ServiceBuilder::new("b").build(),
        ServiceBuilder::new("a").build(),
    ]);

    match resolve(&source, &mut shared, &env) {
        Err(SupervisorError::Config(msg)) => {
            assert!(msg.contains("duplicate service name 'a'"), "got: {msg}")
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn names_with_path_separators_are_rejected() {
    assert_config_error("[[service]]\nname = \"../a\"\n", "path separators");
    assert_config_error("[[service]]\nname = \"  \"\n", "must not be empty");
}

#[test]
fn unknown_kill_signal_is_rejected() {
    assert_config_error(
        "[[service]]\nname = \"a\"\n[service.options]\nkill_signal = \"SIGNOPE\"\n",
        "unknown kill_signal",
    );
}

#[test]
fn unknown_option_keys_fail_to_parse() {
    let err = load_from_str("[[service]]\nname = \"a\"\n[service.options]\nretries = 3\n")
        .unwrap_err();
    assert!(matches!(err, SupervisorError::Toml(_)));
}

#[test]
fn registry_loads_from_disk() {
    let dir = tempdir().unwrap();
    let path = default_registry_path(dir.path());
    assert_eq!(path, dir.path().join("services.toml"));

    fs::write(&path, FULL_REGISTRY).unwrap();
    let file = load_and_validate(&path).unwrap();
    assert_eq!(file.services[1].name, "governor");

    let missing = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(missing, SupervisorError::Io(_)));
}

#[test]
fn file_registry_resolves_against_the_environment() {
    let env = EnvironmentBuilder::new(Path::new("/pc")).build();
    let file = validate(FULL_REGISTRY).unwrap();

    let mut shared = shared_config(&env);
    let descriptors = resolve(&RegistrySource::File(file), &mut shared, &env).unwrap();

    assert_eq!(shared["connector"], json!({ "single": true }));

    let cubes = &descriptors[0];
    assert_eq!(
        cubes.dirs,
        vec![PathBuf::from("/pc/data/cubes/blob"), PathBuf::from("/abs/cache")]
    );
    assert_eq!(cubes.config, Some(json!({ "cachedir": "/tmp/cache" })));
    assert_eq!(descriptors[1].command_name(), "evo-governor");
}

#[test]
fn builtin_registry_mutates_shared_config_in_order() {
    let env = EnvironmentBuilder::new(Path::new("/pc")).build();
    let mut shared = shared_config(&env);

    let descriptors = resolve(&RegistrySource::Builtin, &mut shared, &env).unwrap();
    let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["connector", "cubes", "ambience", "governor", "launcher"]);

    assert_eq!(shared["connector"]["single"], json!(true));
    assert_eq!(shared["cubes"]["cachedir"], json!("/pc/data/cubes/cache"));
    assert_eq!(
        shared["cubes"]["engines"]["blob"]["path"],
        json!("/pc/data/cubes/blob")
    );
    assert_eq!(
        descriptors[1].dirs,
        vec![
            PathBuf::from("/pc/data/cubes/blob"),
            PathBuf::from("/pc/data/cubes/cache"),
        ]
    );
}

#[test]
fn shared_config_starts_with_socket_and_logger() {
    let env = EnvironmentBuilder::new(Path::new("/pc")).build();
    let shared = shared_config(&env);
    assert_eq!(
        shared["neuron"]["dendrite"]["sock"],
        json!("/pc/run/neuron-${name}.sock")
    );
    assert!(shared["logger"].get("level").is_none());
    assert_eq!(shared["logger"]["drivers"]["file"]["driver"], json!("file"));

    let env = EnvironmentBuilder::new(Path::new("/pc")).loglevel("debug").build();
    assert_eq!(shared_config(&env)["logger"]["level"], json!("debug"));
}

#[test]
fn merge_json_merges_objects_and_replaces_the_rest() {
    let mut target = json!({ "a": { "x": 1, "y": 2 }, "b": [1, 2] });
    merge_json(&mut target, json!({ "a": { "y": 3, "z": 4 }, "b": [9], "c": "new" }));
    assert_eq!(
        target,
        json!({ "a": { "x": 1, "y": 3, "z": 4 }, "b": [9], "c": "new" })
    );
}

#[test]
fn prefix_is_glued_onto_absolute_dirs() {
    assert_eq!(
        prefixed_dir("/tmp/root", Path::new("/var/run/pocket-cloud")),
        PathBuf::from("/tmp/root/var/run/pocket-cloud")
    );
    assert_eq!(
        prefixed_dir("", Path::new("/var/log/pocket-cloud")),
        PathBuf::from("/var/log/pocket-cloud")
    );

    let relative = prefixed_dir("", Path::new("data"));
    assert!(relative.is_absolute());
    assert!(relative.ends_with("data"));
}
