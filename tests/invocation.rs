// tests/invocation.rs

mod common;

use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::Signal;
use serde_json::json;

use pocket_cloud_server::config::ProcessOverrides;
use pocket_cloud_server::errors::SupervisorError;
use pocket_cloud_server::exec::invocation::{
    DEFAULT_KILL_SIGNAL, DEFAULT_MAX_RESTARTS, DEFAULT_MIN_UPTIME, DEFAULT_RESTART_DELAY,
};
use pocket_cloud_server::exec::{build_invocation, ProcessOptions};
use pocket_cloud_server::registry::shared_config;

use crate::common::builders::{EnvironmentBuilder, ServiceBuilder};

#[test]
fn defaults_follow_the_environment() {
    let env = EnvironmentBuilder::new(Path::new("/pc")).build();
    let opts = ProcessOptions::defaults_for("cubes", &env);

    assert!(opts.silent);
    assert_eq!(opts.max_restarts, DEFAULT_MAX_RESTARTS);
    assert_eq!(opts.min_uptime, DEFAULT_MIN_UPTIME);
    assert_eq!(opts.restart_delay, DEFAULT_RESTART_DELAY);
    assert_eq!(opts.kill_signal, DEFAULT_KILL_SIGNAL);
    assert_eq!(opts.cwd, PathBuf::from("/pc/run"));
    assert_eq!(opts.stdout_log, PathBuf::from("/pc/log/cubes.stdout.log"));
    assert_eq!(opts.stderr_log, PathBuf::from("/pc/log/cubes.stderr.log"));
}

#[test]
fn overrides_replace_only_what_they_set() {
    let env = EnvironmentBuilder::new(Path::new("/pc")).build();
    let overrides = ProcessOverrides {
        max_restarts: Some(0),
        restart_delay_ms: Some(50),
        kill_signal: Some("SIGINT".to_string()),
        ..ProcessOverrides::default()
    };

    let opts = ProcessOptions::merged("a", &env, &overrides).unwrap();
    assert_eq!(opts.max_restarts, 0);
    assert_eq!(opts.restart_delay, Duration::from_millis(50));
    assert_eq!(opts.kill_signal, Signal::SIGINT);
    assert_eq!(opts.min_uptime, DEFAULT_MIN_UPTIME);
    assert!(opts.silent);
}

#[test]
fn bad_kill_signal_is_a_config_error() {
    let env = EnvironmentBuilder::new(Path::new("/pc")).build();
    let overrides = ProcessOverrides {
        kill_signal: Some("TERMINATE".to_string()),
        ..ProcessOverrides::default()
    };
    let err = ProcessOptions::merged("a", &env, &overrides).unwrap_err();
    assert!(matches!(err, SupervisorError::Config(_)));
}

#[test]
fn command_line_carries_config_and_log_file() {
    let env = EnvironmentBuilder::new(Path::new("/pc")).build();
    let shared = shared_config(&env);
    let desc = ServiceBuilder::new("governor").arg("--trace").build();

    let inv = build_invocation(&desc, &shared, &env, None).unwrap();

    assert_eq!(inv.name, "governor");
    assert_eq!(inv.program, PathBuf::from("evo-governor"));
    assert_eq!(inv.args.len(), 4);
    assert_eq!(inv.args[0], "-D");

    let json_arg = inv.args[1].strip_prefix(".=").unwrap();
    let parsed: serde_json::Value = serde_json::from_str(json_arg).unwrap();
    assert_eq!(parsed, shared);

    assert_eq!(
        inv.args[2],
        "--logger-drivers-file-options-filename=/pc/log/governor.log"
    );
    assert_eq!(inv.args[3], "--trace");
}

#[test]
fn service_config_adds_a_second_define() {
    let env = EnvironmentBuilder::new(Path::new("/pc")).build();
    let shared = json!({ "a": 1 });
    let mut desc = ServiceBuilder::new("cubes").command("cubesd").build();
    desc.config = Some(json!({ "cachedir": "/c" }));

    let inv = build_invocation(&desc, &shared, &env, Some(Path::new("/opt/evo/bin"))).unwrap();

    assert_eq!(inv.program, PathBuf::from("/opt/evo/bin/cubesd"));
    assert_eq!(
        inv.args[..4],
        [
            "-D".to_string(),
            ".={\"a\":1}".to_string(),
            "-D".to_string(),
            ".+={\"cachedir\":\"/c\"}".to_string(),
        ]
    );
    assert_eq!(
        inv.to_string(),
        "/opt/evo/bin/cubesd -D .={\"a\":1} -D .+={\"cachedir\":\"/c\"} --logger-drivers-file-options-filename=/pc/log/cubes.log"
    );
}
