// src/types.rs

use std::fmt;
use std::str::FromStr;

use nix::sys::signal::Signal;
use serde::Serialize;

/// Operational state of a supervised service, as reported to observers.
///
/// There is deliberately no "starting" state: a service has no state at all
/// until its process is confirmed running for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceState {
    /// Process confirmed running.
    On,
    /// Deliberately stopped.
    Off,
    /// Exited without a stop request; the process handle may restart it.
    Down,
    /// A spawn or runtime error was observed.
    Error,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::On => "ON",
            ServiceState::Off => "OFF",
            ServiceState::Down => "DOWN",
            ServiceState::Error => "ERROR",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ON" => Ok(ServiceState::On),
            "OFF" => Ok(ServiceState::Off),
            "DOWN" => Ok(ServiceState::Down),
            "ERROR" => Ok(ServiceState::Error),
            other => Err(format!(
                "invalid service state: {other} (expected ON, OFF, DOWN or ERROR)"
            )),
        }
    }
}

/// How a single process run ended.
///
/// At most one of `code` / `signal` is normally set: a process either exits
/// with a code or is terminated by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitRecord {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitRecord {
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn with_signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Build a record from an OS exit status.
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

impl fmt::Display for ExitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (_, Some(sig)) => write!(f, "signal {}", signal_name(sig)),
            (Some(code), None) => write!(f, "code {code}"),
            (None, None) => f.write_str("unknown"),
        }
    }
}

/// Human-readable name for a raw signal number (`SIGTERM`, or the number
/// itself when the platform does not know it).
pub fn signal_name(signal: i32) -> String {
    match Signal::try_from(signal) {
        Ok(sig) => sig.as_str().to_string(),
        Err(_) => signal.to_string(),
    }
}
