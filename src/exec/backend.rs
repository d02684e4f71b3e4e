// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The supervisor never touches OS processes directly. It asks a
//! [`ProcessLauncher`] to launch an [`Invocation`] and gets back a
//! [`ProcessHandle`]; from then on the handle reports lifecycle
//! notifications through the `ProcessEvent` channel it was given.
//!
//! - [`RealProcessLauncher`] is the production implementation, backed by
//!   [`super::driver`].
//! - Tests provide their own launcher whose handles are driven by hand.

use tokio::sync::mpsc;

use crate::engine::ProcessEvent;
use crate::exec::driver;
use crate::exec::Invocation;

/// One supervised OS process (and its restarts).
///
/// Implementations must not block: both methods are called from the
/// supervisor's event loop.
pub trait ProcessHandle: Send {
    /// Whether the handle is still supervising its process.
    fn is_running(&self) -> bool;

    /// Ask the handle to stop its process for good. The outcome is reported
    /// asynchronously through the notification channel.
    fn stop(&mut self);
}

/// Trait abstracting how service processes are started.
pub trait ProcessLauncher: Send {
    /// Spawn the first instance of `invocation`.
    ///
    /// An error means the process could not be spawned at all; no
    /// notifications will follow for it.
    fn launch(
        &mut self,
        invocation: Invocation,
        events: mpsc::Sender<ProcessEvent>,
    ) -> anyhow::Result<Box<dyn ProcessHandle>>;
}

/// Production launcher: real child processes with bounded auto-restart.
#[derive(Debug, Clone, Default)]
pub struct RealProcessLauncher;

impl RealProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for RealProcessLauncher {
    fn launch(
        &mut self,
        invocation: Invocation,
        events: mpsc::Sender<ProcessEvent>,
    ) -> anyhow::Result<Box<dyn ProcessHandle>> {
        let child = driver::start(invocation, events)?;
        Ok(Box::new(child))
    }
}

/// Handle for a process that never started. Never running; stopping it is a
/// no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStarted;

impl ProcessHandle for NeverStarted {
    fn is_running(&self) -> bool {
        false
    }

    fn stop(&mut self) {}
}
