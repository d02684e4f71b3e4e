// src/exec/driver.rs

//! Real process handle: one OS child process with bounded auto-restart.
//!
//! A background Tokio task owns the child and reports everything that
//! happens to it as `ProcessNotification`s:
//!
//! - `Started` once the first instance is up, `Restarted` for every respawn;
//! - `ExitCode` whenever an instance ends;
//! - `Stopped` when a requested stop was carried out;
//! - `Error` if a respawn fails;
//! - `Exit` exactly once, when the task gives up (restart budget spent,
//!   stop requested, or respawn failure).
//!
//! Restart policy: at most `max_restarts` respawns. An instance that ran for
//! less than `min_uptime` is a "spin" and is respawned only after
//! `restart_delay`; longer runs are respawned immediately.

use std::fs::OpenOptions;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::engine::{ProcessEvent, ProcessNotification};
use crate::exec::{Invocation, ProcessHandle};
use crate::types::ExitRecord;

/// How long a stopped process may take to exit after its stop signal before
/// it is killed.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// [`ProcessHandle`] backed by a real child process.
///
/// Dropping it without calling `stop()` kills the child.
#[derive(Debug)]
pub struct ChildProcess {
    name: String,
    running: Arc<AtomicBool>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl ProcessHandle for ChildProcess {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        match self.stop_tx.take() {
            Some(tx) => {
                if tx.send(()).is_err() {
                    debug!(service = %self.name, "process driver already finished");
                }
            }
            None => debug!(service = %self.name, "stop already sent"),
        }
    }
}

/// Spawn the first instance of `invocation` and hand it to a supervising
/// background task.
///
/// Fails only if that first spawn fails.
pub fn start(invocation: Invocation, events: mpsc::Sender<ProcessEvent>) -> Result<ChildProcess> {
    let child = spawn_child(&invocation)?;

    let running = Arc::new(AtomicBool::new(true));
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let name = invocation.name.clone();

    let flag = Arc::clone(&running);
    tokio::spawn(async move {
        supervise(invocation, child, events, stop_rx, flag).await;
    });

    Ok(ChildProcess {
        name,
        running,
        stop_tx: Some(stop_tx),
    })
}

/// Spawn one instance of the process described by `inv`.
pub fn spawn_child(inv: &Invocation) -> Result<Child> {
    let mut cmd = Command::new(&inv.program);
    cmd.args(&inv.args)
        .current_dir(&inv.options.cwd)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    if inv.options.silent {
        cmd.stdout(open_log(&inv.options.stdout_log)?)
            .stderr(open_log(&inv.options.stderr_log)?);
    } else {
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }

    let child = cmd.spawn().with_context(|| {
        format!(
            "spawning {} for service '{}'",
            inv.program.display(),
            inv.name
        )
    })?;

    info!(service = %inv.name, pid = ?child.id(), "process spawned");
    Ok(child)
}

fn open_log(path: &Path) -> Result<Stdio> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    Ok(Stdio::from(file))
}

async fn supervise(
    inv: Invocation,
    mut child: Child,
    events: mpsc::Sender<ProcessEvent>,
    mut stop_rx: oneshot::Receiver<()>,
    running: Arc<AtomicBool>,
) {
    let name = inv.name.clone();
    notify(&events, &name, ProcessNotification::Started).await;

    let mut restarts: u32 = 0;
    let mut started_at = Instant::now();

    loop {
        tokio::select! {
            status = child.wait() => {
                let record = match status {
                    Ok(status) => ExitRecord::from_status(status),
                    Err(err) => {
                        warn!(service = %name, error = %err, "failed to wait for process");
                        notify(
                            &events,
                            &name,
                            ProcessNotification::Error(format!("waiting for process: {err}")),
                        )
                        .await;
                        break;
                    }
                };

                info!(service = %name, exit = %record, restarts, "process exited");
                notify(&events, &name, ProcessNotification::ExitCode(record)).await;

                if restarts >= inv.options.max_restarts {
                    warn!(
                        service = %name,
                        max_restarts = inv.options.max_restarts,
                        "restart limit reached; giving up"
                    );
                    break;
                }

                if started_at.elapsed() < inv.options.min_uptime {
                    debug!(
                        service = %name,
                        delay_ms = inv.options.restart_delay.as_millis() as u64,
                        "process exited before min uptime; delaying restart"
                    );
                    tokio::select! {
                        _ = sleep(inv.options.restart_delay) => {}
                        req = &mut stop_rx => {
                            if req.is_ok() {
                                notify(&events, &name, ProcessNotification::Stopped).await;
                            }
                            break;
                        }
                    }
                }

                match spawn_child(&inv) {
                    Ok(next) => {
                        child = next;
                        restarts += 1;
                        started_at = Instant::now();
                        notify(&events, &name, ProcessNotification::Restarted).await;
                    }
                    Err(err) => {
                        warn!(service = %name, error = %err, "respawn failed");
                        notify(&events, &name, ProcessNotification::Error(format!("{err:#}"))).await;
                        break;
                    }
                }
            }

            req = &mut stop_rx => {
                // A dropped handle also lands here; the child is killed
                // without ceremony in that case.
                let requested = req.is_ok();
                let record = terminate(&inv, &mut child, requested).await;
                if requested {
                    notify(&events, &name, ProcessNotification::Stopped).await;
                }
                if let Some(record) = record {
                    notify(&events, &name, ProcessNotification::ExitCode(record)).await;
                }
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    notify(&events, &name, ProcessNotification::Exit).await;
    debug!(service = %name, "process driver finished");
}

/// Stop `child`: stop signal first (when `graceful`), SIGKILL if it does not
/// exit within [`STOP_GRACE_PERIOD`].
async fn terminate(inv: &Invocation, child: &mut Child, graceful: bool) -> Option<ExitRecord> {
    if graceful {
        if let Some(pid) = child.id() {
            info!(
                service = %inv.name,
                pid,
                signal = ?inv.options.kill_signal,
                "sending stop signal"
            );
            if let Err(err) = kill(Pid::from_raw(pid as i32), inv.options.kill_signal) {
                warn!(service = %inv.name, error = %err, "failed to signal process");
            }

            match timeout(STOP_GRACE_PERIOD, child.wait()).await {
                Ok(Ok(status)) => return Some(ExitRecord::from_status(status)),
                Ok(Err(err)) => {
                    warn!(service = %inv.name, error = %err, "failed to wait for stopped process");
                    return None;
                }
                Err(_) => {
                    warn!(service = %inv.name, "process did not stop in time; killing");
                }
            }
        }
    }

    if let Err(err) = child.kill().await {
        debug!(service = %inv.name, error = %err, "kill failed; process may already be gone");
    }

    match child.try_wait() {
        Ok(Some(status)) => Some(ExitRecord::from_status(status)),
        _ => None,
    }
}

async fn notify(events: &mpsc::Sender<ProcessEvent>, name: &str, notification: ProcessNotification) {
    if events.send(ProcessEvent::new(name, notification)).await.is_err() {
        debug!(service = %name, "supervisor gone; dropping process notification");
    }
}
