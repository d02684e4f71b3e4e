// src/engine/supervisor.rs

//! Top-level orchestration of all services.
//!
//! Startup runs in two phases:
//!
//! 1. services: resolve the registry, create the base directories
//!    (run, data, log), then every service's own directories, then spawn
//!    every service in registry order;
//! 2. control plane: start it once every service has been spawned.
//!
//! Exactly one of `Started` / `Error` reports the outcome. A failure in
//! phase 1 skips everything after it, so a directory that cannot be created
//! means nothing is spawned.
//!
//! Afterwards a single event loop owns all monitors. It feeds process
//! notifications to them, republishes state changes, decorates and
//! republishes service errors, and drives shutdown: every live monitor is
//! asked to stop at once and `Stopped` fires after the last one reaches its
//! terminal state, or when the shutdown timeout expires.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::api::{ControlPlane, StatusBoard};
use crate::config::Environment;
use crate::engine::handle::SupervisorHandle;
use crate::engine::monitor::{MonitorEvent, ServiceMonitor};
use crate::engine::{
    ProcessEvent, ProcessNotification, SupervisorCommand, SupervisorEvent,
};
use crate::errors::{Result, ServiceError, ServiceFailure, SupervisorError};
use crate::exec::{build_invocation, Invocation, NeverStarted, ProcessLauncher};
use crate::fs::{FileSystem, RealFileSystem};
use crate::registry::{self, RegistrySource};

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

const PROCESS_EVENT_CAPACITY: usize = 256;
const COMMAND_CAPACITY: usize = 16;

/// Supervisor knobs that are not part of the environment record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// Directory holding the service executables; `PATH` lookup when unset.
    pub bindir: Option<PathBuf>,
    /// Upper bound on how long a shutdown may wait for services.
    pub shutdown_timeout: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            bindir: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Lifecycle of the supervisor itself.
///
/// `Idle -> Starting -> Active -> Stopping -> Stopped`. `Active` is reached
/// whether or not startup succeeded, so a failed startup can still be shut
/// down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    Idle,
    Starting,
    Active,
    Stopping,
    Stopped,
}

impl SupervisorPhase {
    pub fn can_transition_to(self, next: SupervisorPhase) -> bool {
        use SupervisorPhase::*;
        matches!(
            (self, next),
            (Idle, Starting) | (Starting, Active) | (Active, Stopping) | (Stopping, Stopped)
        )
    }
}

pub struct Supervisor<L: ProcessLauncher, C: ControlPlane> {
    env: Environment,
    source: RegistrySource,
    options: SupervisorOptions,
    launcher: L,
    control_plane: C,
    fs: Arc<dyn FileSystem>,
    status: StatusBoard,
    events_tx: mpsc::Sender<SupervisorEvent>,
    process_tx: mpsc::Sender<ProcessEvent>,
    process_rx: mpsc::Receiver<ProcessEvent>,
    monitors: Vec<ServiceMonitor>,
    phase: SupervisorPhase,
    errors: Vec<ServiceError>,
    stop_deadline: Option<Instant>,
}

impl<L: ProcessLauncher, C: ControlPlane> std::fmt::Debug for Supervisor<L, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("env", &self.env)
            .field("phase", &self.phase)
            .field("monitors", &self.monitors)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl<L, C> Supervisor<L, C>
where
    L: ProcessLauncher + 'static,
    C: ControlPlane + 'static,
{
    pub fn new(
        env: Environment,
        source: RegistrySource,
        launcher: L,
        control_plane: C,
        events_tx: mpsc::Sender<SupervisorEvent>,
    ) -> Self {
        let (process_tx, process_rx) = mpsc::channel::<ProcessEvent>(PROCESS_EVENT_CAPACITY);
        Self {
            env,
            source,
            options: SupervisorOptions::default(),
            launcher,
            control_plane,
            fs: Arc::new(RealFileSystem),
            status: StatusBoard::new(),
            events_tx,
            process_tx,
            process_rx,
            monitors: Vec::new(),
            phase: SupervisorPhase::Idle,
            errors: Vec::new(),
            stop_deadline: None,
        }
    }

    pub fn with_options(mut self, options: SupervisorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Share a status board with the control plane.
    pub fn with_status_board(mut self, status: StatusBoard) -> Self {
        self.status = status;
        self
    }

    pub fn phase(&self) -> SupervisorPhase {
        self.phase
    }

    pub fn monitors(&self) -> &[ServiceMonitor] {
        &self.monitors
    }

    /// Run the supervisor on its own Tokio task.
    pub fn spawn(self) -> SupervisorHandle {
        let (tx, rx) = mpsc::channel::<SupervisorCommand>(COMMAND_CAPACITY);
        let task = tokio::spawn(self.run(rx));
        SupervisorHandle::new(tx, task)
    }

    /// Start everything, then process events until shutdown completes.
    ///
    /// Commands are only looked at once startup has finished. Closing the
    /// command channel counts as a stop request.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SupervisorCommand>) {
        self.start().await;

        let mut commands_open = true;
        while self.phase != SupervisorPhase::Stopped {
            let deadline = self.stop_deadline;

            tokio::select! {
                Some(event) = self.process_rx.recv() => {
                    debug!(?event, "supervisor received process event");
                    self.on_process_event(event).await;
                }

                cmd = commands.recv(), if commands_open => match cmd {
                    Some(SupervisorCommand::Stop) => self.stop().await,
                    None => {
                        debug!("command channel closed; stopping");
                        commands_open = false;
                        self.stop().await;
                    }
                },

                _ = wait_until(deadline) => self.on_shutdown_timeout().await,
            }
        }

        info!("supervisor finished");
    }

    async fn start(&mut self) {
        self.transition(SupervisorPhase::Starting);

        let result = match self.start_services().await {
            Ok(()) => self.start_api().await,
            Err(err) => Err(err),
        };

        self.transition(SupervisorPhase::Active);

        match result {
            Ok(()) => {
                info!(services = self.monitors.len(), "supervisor started");
                self.emit(SupervisorEvent::Started).await;
            }
            Err(err) => {
                error!(error = %err, "startup failed");
                self.emit(SupervisorEvent::Error(err)).await;
            }
        }
    }

    async fn start_services(&mut self) -> Result<()> {
        let mut shared = registry::shared_config(&self.env);
        let descriptors = registry::resolve(&self.source, &mut shared, &self.env)?;

        let base: Vec<PathBuf> = self
            .env
            .base_dirs()
            .iter()
            .map(|p| p.to_path_buf())
            .collect();
        for dir in base.iter() {
            self.ensure_dir(dir)?;
        }

        for desc in descriptors.iter() {
            for dir in desc.dirs.iter() {
                self.ensure_dir(dir)?;
            }
        }

        let bindir = self.options.bindir.clone();
        let invocations = descriptors
            .iter()
            .map(|desc| build_invocation(desc, &shared, &self.env, bindir.as_deref()))
            .collect::<Result<Vec<Invocation>>>()?;

        for invocation in invocations {
            self.spawn_service(invocation).await?;
        }

        Ok(())
    }

    async fn start_api(&mut self) -> Result<()> {
        self.emit(SupervisorEvent::StartApi).await;
        self.control_plane.start().await
    }

    fn ensure_dir(&self, dir: &Path) -> Result<()> {
        if self.fs.is_dir(dir) {
            debug!(dir = %dir.display(), "directory exists");
            return Ok(());
        }

        self.fs
            .create_dir_all(dir)
            .map_err(|source| SupervisorError::DirectoryBootstrap {
                path: dir.to_path_buf(),
                source,
            })?;

        debug!(dir = %dir.display(), "created directory");
        Ok(())
    }

    async fn spawn_service(&mut self, invocation: Invocation) -> Result<()> {
        let name = invocation.name.clone();
        self.status.register(&name);
        self.emit(SupervisorEvent::StartService(name.clone())).await;

        info!(service = %name, cmd = %invocation, "starting service");

        match self.launcher.launch(invocation, self.process_tx.clone()) {
            Ok(handle) => {
                self.monitors.push(ServiceMonitor::new(name, handle));
                Ok(())
            }
            Err(err) => {
                let message = format!("{err:#}");
                error!(service = %name, error = %message, "failed to spawn service");

                // Run the failure through the monitor so observers see the
                // ERROR state; the error itself becomes the startup outcome.
                self.monitors
                    .push(ServiceMonitor::new(name.clone(), Box::new(NeverStarted)));
                let idx = self.monitors.len() - 1;

                let mut failures = self
                    .drive_monitor(idx, ProcessNotification::Error(message.clone()))
                    .await;
                failures.extend(self.drive_monitor(idx, ProcessNotification::Exit).await);

                let failure = failures
                    .into_iter()
                    .next()
                    .unwrap_or(ServiceFailure::SpawnOrRuntime(message));
                Err(ServiceError::new(name, failure).into())
            }
        }
    }

    /// Feed one notification to the monitor at `idx`, publish what it
    /// produced and return its failures.
    async fn drive_monitor(
        &mut self,
        idx: usize,
        notification: ProcessNotification,
    ) -> Vec<ServiceFailure> {
        let events = self.monitors[idx].handle(notification);
        let name = self.monitors[idx].name().to_string();

        let mut failures = Vec::new();
        for event in events {
            match event {
                MonitorEvent::StateChanged(state) => {
                    info!(service = %name, %state, "service state changed");
                    self.status.set(&name, state);
                    self.emit(SupervisorEvent::ServiceState {
                        name: name.clone(),
                        state,
                    })
                    .await;
                }
                MonitorEvent::On => debug!(service = %name, "service running"),
                MonitorEvent::Off => debug!(service = %name, "service process ended"),
                MonitorEvent::Exit(last_exit) => {
                    info!(service = %name, exit = ?last_exit, "service exited after stop");
                }
                MonitorEvent::Error(failure) => failures.push(failure),
            }
        }
        failures
    }

    async fn on_process_event(&mut self, event: ProcessEvent) {
        let Some(idx) = self.monitors.iter().position(|m| m.name() == event.service) else {
            warn!(service = %event.service, "process event for unknown service");
            return;
        };

        let failures = self.drive_monitor(idx, event.notification).await;
        for failure in failures {
            self.on_service_error(ServiceError::new(event.service.clone(), failure))
                .await;
        }

        self.maybe_finish_stop().await;
    }

    async fn on_service_error(&mut self, err: ServiceError) {
        warn!(service = %err.service, error = %err.failure, "service error");
        self.errors.push(err.clone());
        self.emit(SupervisorEvent::Error(SupervisorError::Service(err)))
            .await;
    }

    async fn stop(&mut self) {
        if matches!(
            self.phase,
            SupervisorPhase::Stopping | SupervisorPhase::Stopped
        ) {
            debug!("stop already in progress");
            return;
        }

        info!("stopping all services");
        self.transition(SupervisorPhase::Stopping);
        // A timeout too large to represent means no deadline at all.
        self.stop_deadline = Instant::now().checked_add(self.options.shutdown_timeout);
        if self.stop_deadline.is_none() {
            debug!("shutdown timeout out of range; waiting without a deadline");
        }

        let pending: Vec<usize> = (0..self.monitors.len())
            .filter(|&idx| !self.monitors[idx].stopped())
            .collect();

        for idx in pending {
            let name = self.monitors[idx].name().to_string();
            self.emit(SupervisorEvent::StopService(name)).await;
            self.monitors[idx].stop();
        }

        self.maybe_finish_stop().await;
    }

    async fn maybe_finish_stop(&mut self) {
        if self.phase != SupervisorPhase::Stopping {
            return;
        }
        if !self.monitors.iter().all(|m| m.stopped()) {
            return;
        }

        self.transition(SupervisorPhase::Stopped);
        self.stop_deadline = None;

        let err = if self.errors.is_empty() {
            None
        } else {
            Some(SupervisorError::Aggregated(std::mem::take(&mut self.errors)))
        };

        info!(clean = err.is_none(), "all services stopped");
        self.emit(SupervisorEvent::Stopped(err)).await;
    }

    async fn on_shutdown_timeout(&mut self) {
        let pending: Vec<String> = self
            .monitors
            .iter()
            .filter(|m| !m.stopped())
            .map(|m| m.name().to_string())
            .collect();

        error!(
            ?pending,
            timeout_ms = self.options.shutdown_timeout.as_millis() as u64,
            "shutdown timed out"
        );

        // Dropping the handles kills whatever is still running.
        self.monitors.retain(|m| m.stopped());

        self.transition(SupervisorPhase::Stopped);
        self.stop_deadline = None;

        let event = SupervisorEvent::Stopped(Some(SupervisorError::ShutdownTimeout {
            pending,
            timeout: self.options.shutdown_timeout,
            errors: std::mem::take(&mut self.errors),
        }));
        self.emit(event).await;
    }

    fn transition(&mut self, next: SupervisorPhase) {
        if !self.phase.can_transition_to(next) {
            warn!(from = ?self.phase, to = ?next, "unexpected supervisor phase transition");
        }
        debug!(from = ?self.phase, to = ?next, "supervisor phase");
        self.phase = next;
    }

    async fn emit(&mut self, event: SupervisorEvent) {
        debug!(%event, "supervisor event");
        if self.events_tx.send(event).await.is_err() {
            debug!("event receiver dropped; event discarded");
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
