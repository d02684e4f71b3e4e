// src/engine/monitor.rs

//! Per-service lifecycle state machine.
//!
//! A [`ServiceMonitor`] owns exactly one [`ProcessHandle`] and consumes that
//! handle's [`ProcessNotification`]s. It has no channels and performs no IO:
//! [`ServiceMonitor::handle`] returns the events the notification produced
//! and the supervisor decides what to do with them.
//!
//! Rules:
//! - the displayed state is unset until the first confirmed start;
//! - a state is reported only when it differs from the previous one;
//! - `ERROR` and `OFF` never change again once reached;
//! - the terminal `Exit` notification is handled exactly once and yields
//!   either a graceful [`MonitorEvent::Exit`] (after `stop()`) or a
//!   synthesized [`MonitorEvent::Error`], never both;
//! - once an error has been reported the terminal exit stays silent, even
//!   after `stop()`.

use tracing::{debug, trace};

use crate::engine::ProcessNotification;
use crate::errors::ServiceFailure;
use crate::exec::ProcessHandle;
use crate::types::{ExitRecord, ServiceState};

/// Event produced by a monitor in response to one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// The displayed state changed.
    StateChanged(ServiceState),
    /// The process is (again) running.
    On,
    /// A run of the process ended.
    Off,
    /// Graceful completion after a stop request, with the last exit record.
    Exit(Option<ExitRecord>),
    Error(ServiceFailure),
}

pub struct ServiceMonitor {
    name: String,
    handle: Box<dyn ProcessHandle>,
    state: Option<ServiceState>,
    stop_requested: bool,
    terminated: bool,
    error_reported: bool,
    last_exit: Option<ExitRecord>,
}

impl std::fmt::Debug for ServiceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMonitor")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("stop_requested", &self.stop_requested)
            .field("terminated", &self.terminated)
            .field("last_exit", &self.last_exit)
            .finish_non_exhaustive()
    }
}

impl ServiceMonitor {
    pub fn new(name: impl Into<String>, handle: Box<dyn ProcessHandle>) -> Self {
        Self {
            name: name.into(),
            handle,
            state: None,
            stop_requested: false,
            terminated: false,
            error_reported: false,
            last_exit: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last reported state; `None` before the first confirmed start.
    pub fn state(&self) -> Option<ServiceState> {
        self.state
    }

    /// Whether the wrapped process handle reports itself alive.
    pub fn running(&self) -> bool {
        self.handle.is_running()
    }

    /// Whether the terminal exit has been handled.
    pub fn stopped(&self) -> bool {
        self.terminated
    }

    pub fn stopping(&self) -> bool {
        self.stop_requested
    }

    pub fn last_exit(&self) -> Option<ExitRecord> {
        self.last_exit
    }

    /// Request a deliberate stop.
    ///
    /// Only the first call has an effect. The process handle is asked to stop
    /// only if it is currently running.
    pub fn stop(&mut self) {
        if self.stop_requested {
            trace!(service = %self.name, "stop already requested");
            return;
        }
        self.stop_requested = true;

        if self.handle.is_running() {
            debug!(service = %self.name, "requesting process stop");
            self.handle.stop();
        } else {
            debug!(service = %self.name, "stop requested but process is not running");
        }
    }

    /// Feed one notification from the process handle.
    pub fn handle(&mut self, notification: ProcessNotification) -> Vec<MonitorEvent> {
        let mut events = Vec::new();

        match notification {
            ProcessNotification::Started | ProcessNotification::Restarted => {
                self.set_state(ServiceState::On, &mut events);
                events.push(MonitorEvent::On);
            }
            ProcessNotification::ExitCode(record) => {
                // Recorded first so a later terminal exit classifies correctly.
                self.last_exit = Some(record);
                if self.stop_requested {
                    self.set_state(ServiceState::Off, &mut events);
                } else {
                    self.set_state(ServiceState::Down, &mut events);
                }
                events.push(MonitorEvent::Off);
            }
            ProcessNotification::Stopped => {
                self.set_state(ServiceState::Off, &mut events);
            }
            ProcessNotification::Exit => self.on_terminal_exit(&mut events),
            ProcessNotification::Error(message) if self.terminated => {
                debug!(service = %self.name, %message, "error after terminal exit ignored");
            }
            ProcessNotification::Error(message) => {
                self.set_state(ServiceState::Error, &mut events);
                self.error_reported = true;
                events.push(MonitorEvent::Error(ServiceFailure::SpawnOrRuntime(message)));
            }
        }

        events
    }

    fn on_terminal_exit(&mut self, events: &mut Vec<MonitorEvent>) {
        if self.terminated {
            debug!(service = %self.name, "duplicate terminal exit ignored");
            return;
        }
        self.terminated = true;

        if self.error_reported {
            debug!(
                service = %self.name,
                "terminal exit after an already reported error"
            );
            return;
        }

        if self.stop_requested {
            self.set_state(ServiceState::Off, events);
            events.push(MonitorEvent::Exit(self.last_exit));
            return;
        }

        let failure = classify_exit(self.last_exit);
        self.set_state(ServiceState::Error, events);
        self.error_reported = true;
        events.push(MonitorEvent::Error(failure));
    }

    fn set_state(&mut self, state: ServiceState, events: &mut Vec<MonitorEvent>) {
        match self.state {
            Some(current) if current == state => {}
            Some(current @ (ServiceState::Error | ServiceState::Off)) => {
                trace!(
                    service = %self.name,
                    %current,
                    requested = %state,
                    "state is final; ignoring transition"
                );
            }
            _ => {
                self.state = Some(state);
                events.push(MonitorEvent::StateChanged(state));
            }
        }
    }
}

/// Failure for a terminal exit that nobody asked for.
pub fn classify_exit(last_exit: Option<ExitRecord>) -> ServiceFailure {
    match last_exit {
        Some(ExitRecord {
            signal: Some(sig), ..
        }) => ServiceFailure::KilledBySignal(sig),
        Some(ExitRecord {
            code: Some(code), ..
        }) => ServiceFailure::ExitedWithCode(code),
        _ => ServiceFailure::UnknownExit,
    }
}
