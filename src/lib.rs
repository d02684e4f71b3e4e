// src/lib.rs

pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod registry;
pub mod types;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::{HttpControlPlane, StatusBoard};
use crate::cli::CliArgs;
use crate::config::{default_registry_path, load_and_validate, prefixed_dir, Environment};
use crate::engine::{Supervisor, SupervisorEvent, SupervisorHandle, SupervisorOptions};
use crate::exec::{build_invocation, RealProcessLauncher};
use crate::registry::RegistrySource;

const EVENT_CAPACITY: usize = 256;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - environment + registry resolution
/// - the supervisor with real processes and the HTTP control plane
/// - the event reporter
/// - SIGINT / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    let env = environment_from_args(&args);
    let source = registry_source(&args)?;

    if args.dry_run {
        print_dry_run(&source, &env, args.bindir.as_deref())?;
        return Ok(());
    }

    let (events_tx, events_rx) = mpsc::channel::<SupervisorEvent>(EVENT_CAPACITY);

    let status = StatusBoard::new();
    let control_plane = HttpControlPlane::new(&env, status.clone()).with_assets(args.assets.clone());

    let options = SupervisorOptions {
        bindir: args.bindir.clone(),
        shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
    };

    info!(
        rundir = %env.rundir.display(),
        datadir = %env.datadir.display(),
        logdir = %env.logdir.display(),
        addr = %env.listen_addr(),
        "starting supervisor"
    );

    let handle = Supervisor::new(env, source, RealProcessLauncher::new(), control_plane, events_tx)
        .with_options(options)
        .with_status_board(status)
        .spawn();

    let outcome = report_until_stopped(&handle, events_rx, shutdown_signal()).await;
    handle.join().await?;
    outcome
}

/// Build the environment record: every directory absolute, then prefixed.
pub fn environment_from_args(args: &CliArgs) -> Environment {
    Environment {
        rundir: prefixed_dir(&args.prefix, &args.rundir),
        datadir: prefixed_dir(&args.prefix, &args.datadir),
        logdir: prefixed_dir(&args.prefix, &args.logdir),
        loglevel: Some(args.loglevel.clone()).filter(|l| !l.is_empty()),
        port: args.port,
        host: args.host.clone(),
    }
}

/// `--services` if given, else `<confdir>/services.toml` if present, else the
/// built-in registry.
pub fn registry_source(args: &CliArgs) -> Result<RegistrySource> {
    if let Some(ref path) = args.services {
        debug!(path = %path.display(), "loading service registry");
        return Ok(RegistrySource::File(load_and_validate(path)?));
    }

    let confdir = prefixed_dir(&args.prefix, &args.confdir);
    let default_path = default_registry_path(&confdir);
    if default_path.is_file() {
        debug!(path = %default_path.display(), "loading service registry");
        return Ok(RegistrySource::File(load_and_validate(&default_path)?));
    }

    debug!("using built-in service registry");
    Ok(RegistrySource::Builtin)
}

/// Log supervisor events until `stop` arrives, asking for a full stop on the
/// first error or when `shutdown` resolves.
///
/// Returns `Ok` only for a clean stop with no error reported on the way.
pub async fn report_until_stopped<F>(
    handle: &SupervisorHandle,
    mut events: mpsc::Receiver<SupervisorEvent>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut errors: Vec<String> = Vec::new();
    let mut stop_requested = false;
    let mut signalled = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    return Err(anyhow!("supervisor exited without reporting a stop"));
                };

                match event {
                    SupervisorEvent::StartService(name) => info!(service = %name, "START-SERVICE"),
                    SupervisorEvent::StopService(name) => info!(service = %name, "STOP-SERVICE"),
                    SupervisorEvent::ServiceState { name, state } => {
                        info!(service = %name, %state, "SERVICE");
                    }
                    SupervisorEvent::StartApi => info!("START-API"),
                    SupervisorEvent::Started => info!("STARTED"),
                    SupervisorEvent::Error(err) => {
                        error!(error = %err, "ERROR");
                        errors.push(err.to_string());
                        if !stop_requested {
                            stop_requested = true;
                            handle.stop().await;
                        }
                    }
                    SupervisorEvent::Stopped(Some(err)) => {
                        error!(error = %err, "stopped with errors");
                        return Err(err.into());
                    }
                    SupervisorEvent::Stopped(None) => {
                        if errors.is_empty() {
                            info!("QUIT");
                            return Ok(());
                        }
                        return Err(anyhow!(
                            "{} error(s) reported: {}",
                            errors.len(),
                            errors.join("; ")
                        ));
                    }
                }
            }

            _ = &mut shutdown, if !signalled => {
                signalled = true;
                info!("EXITING");
                if !stop_requested {
                    stop_requested = true;
                    handle.stop().await;
                }
            }
        }
    }
}

/// Resolves on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let mut term = match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(err) => {
            warn!(error = %err, "failed to listen for SIGTERM");
            None
        }
    };

    let terminate = async {
        match term.as_mut() {
            Some(stream) => {
                stream.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                warn!(error = %err, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
        _ = terminate => {}
    }
}

/// Print every resolved invocation without touching the filesystem.
pub fn print_dry_run(source: &RegistrySource, env: &Environment, bindir: Option<&Path>) -> Result<()> {
    let mut shared = registry::shared_config(env);
    let descriptors = registry::resolve(source, &mut shared, env)?;

    println!("pocket-cloud-server dry-run");
    println!("  rundir  = {}", env.rundir.display());
    println!("  datadir = {}", env.datadir.display());
    println!("  logdir  = {}", env.logdir.display());
    println!("  api     = {}", env.listen_addr());
    println!();

    println!("services ({}):", descriptors.len());
    for desc in descriptors.iter() {
        let inv = build_invocation(desc, &shared, env, bindir)?;
        let opts = &inv.options;

        println!("  - {}", inv.name);
        println!("      program: {}", inv.program.display());
        for arg in inv.args.iter() {
            println!("      arg: {arg}");
        }
        if !desc.dirs.is_empty() {
            println!("      dirs: {:?}", desc.dirs);
        }
        println!("      cwd: {}", opts.cwd.display());
        println!(
            "      restarts: max {}, min uptime {}ms, delay {}ms",
            opts.max_restarts,
            opts.min_uptime.as_millis(),
            opts.restart_delay.as_millis()
        );
        println!("      kill signal: {}", opts.kill_signal.as_str());
        if opts.silent {
            println!("      stdout: {}", opts.stdout_log.display());
            println!("      stderr: {}", opts.stderr_log.display());
        }
    }

    debug!("dry-run complete (nothing started)");
    Ok(())
}
