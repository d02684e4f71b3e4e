// src/engine/mod.rs

//! Supervision engine.
//!
//! Events flow upward through typed channels:
//!
//! - process handles send [`ProcessEvent`]s (raw lifecycle notifications)
//!   into the supervisor's single event loop;
//! - each [`ServiceMonitor`] reduces its service's notifications into a
//!   four-state lifecycle and a small set of [`MonitorEvent`]s;
//! - the [`Supervisor`] republishes them as [`SupervisorEvent`]s, the only
//!   surface a caller (CLI, tests, another front end) should depend on.
//!
//! The monitor is pure and synchronous; all IO and sequencing lives in
//! [`supervisor`].

use std::fmt;

use crate::errors::SupervisorError;
use crate::types::{ExitRecord, ServiceState};

/// Canonical service name type used throughout the engine.
pub type ServiceName = String;

/// Raw lifecycle notification emitted by a process handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessNotification {
    /// First successful spawn.
    Started,
    /// Successful respawn after an unexpected exit.
    Restarted,
    /// A requested stop was carried out.
    Stopped,
    /// One run of the process ended.
    ExitCode(ExitRecord),
    /// The handle has given up: no further restarts will happen.
    Exit,
    /// Spawn or runtime failure inside the handle.
    Error(String),
}

/// A [`ProcessNotification`] tagged with its service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEvent {
    pub service: ServiceName,
    pub notification: ProcessNotification,
}

impl ProcessEvent {
    pub fn new(service: impl Into<ServiceName>, notification: ProcessNotification) -> Self {
        Self {
            service: service.into(),
            notification,
        }
    }
}

/// Requests accepted by a running supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorCommand {
    Stop,
}

/// Outward event surface of the supervisor.
#[derive(Debug)]
pub enum SupervisorEvent {
    /// Emitted immediately before a service is spawned.
    StartService(ServiceName),
    /// Emitted immediately before a service is asked to stop.
    StopService(ServiceName),
    ServiceState {
        name: ServiceName,
        state: ServiceState,
    },
    /// Emitted before the control plane is started.
    StartApi,
    /// Startup completed.
    Started,
    /// Shutdown completed; carries aggregated service errors or a timeout.
    Stopped(Option<SupervisorError>),
    /// Startup failure or a (decorated) service error.
    Error(SupervisorError),
}

impl fmt::Display for SupervisorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorEvent::StartService(name) => write!(f, "start-service({name})"),
            SupervisorEvent::StopService(name) => write!(f, "stop-service({name})"),
            SupervisorEvent::ServiceState { name, state } => {
                write!(f, "service-state({name}, {state})")
            }
            SupervisorEvent::StartApi => f.write_str("start-api"),
            SupervisorEvent::Started => f.write_str("start"),
            SupervisorEvent::Stopped(None) => f.write_str("stop"),
            SupervisorEvent::Stopped(Some(err)) => write!(f, "stop({err})"),
            SupervisorEvent::Error(err) => write!(f, "error({err})"),
        }
    }
}

pub mod handle;
pub mod monitor;
pub mod supervisor;

pub use handle::SupervisorHandle;
pub use monitor::{MonitorEvent, ServiceMonitor};
pub use supervisor::{Supervisor, SupervisorOptions, SupervisorPhase};
