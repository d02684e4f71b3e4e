// src/errors.rs

//! Crate-wide error types.
//!
//! - [`ServiceFailure`] is what a single service monitor reports.
//! - [`ServiceError`] is a failure tagged with the service that produced it.
//! - [`SupervisorError`] covers everything the supervisor itself can surface.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::signal_name;

/// Failure observed for one service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceFailure {
    /// Reported directly by the process handle (e.g. missing executable).
    #[error("{0}")]
    SpawnOrRuntime(String),

    #[error("killed by signal {}", describe_signal(.0))]
    KilledBySignal(i32),

    #[error("exited with code {0}")]
    ExitedWithCode(i32),

    /// Terminal exit without any exit record ever being observed.
    #[error("exited for an unknown reason")]
    UnknownExit,
}

/// A [`ServiceFailure`] tagged with the owning service's name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ServiceError {service}: {failure}")]
pub struct ServiceError {
    pub service: String,
    pub failure: ServiceFailure,
}

impl ServiceError {
    pub fn new(service: impl Into<String>, failure: ServiceFailure) -> Self {
        Self {
            service: service.into(),
            failure,
        }
    }
}

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryBootstrap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("control plane failed to listen on {addr}: {source}")]
    ControlPlaneBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("{}", join_errors(.0))]
    Aggregated(Vec<ServiceError>),

    /// Services still running at the deadline, plus any service errors
    /// collected before it.
    #[error("{}", timeout_message(*.timeout, .pending, .errors))]
    ShutdownTimeout {
        pending: Vec<String>,
        timeout: Duration,
        errors: Vec<ServiceError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SupervisorError {
    /// Name of the service this error is attributed to, if any.
    pub fn service(&self) -> Option<&str> {
        match self {
            SupervisorError::Service(err) => Some(err.service.as_str()),
            _ => None,
        }
    }
}

fn describe_signal(signal: &i32) -> String {
    signal_name(*signal)
}

fn join_errors(errors: &[ServiceError]) -> String {
    let parts: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    format!("{} service error(s): {}", errors.len(), parts.join("; "))
}

fn timeout_message(timeout: Duration, pending: &[String], errors: &[ServiceError]) -> String {
    let mut message = format!(
        "shutdown timed out after {}ms; still running: {}",
        timeout.as_millis(),
        pending.join(", ")
    );
    if !errors.is_empty() {
        message.push_str("; ");
        message.push_str(&join_errors(errors));
    }
    message
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
