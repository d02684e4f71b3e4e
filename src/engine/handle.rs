// src/engine/handle.rs

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::SupervisorCommand;
use crate::errors::Result;

/// Control handle for a supervisor running on its own task.
///
/// Dropping the handle closes the command channel, which the supervisor
/// treats as a stop request.
#[derive(Debug)]
pub struct SupervisorHandle {
    commands: mpsc::Sender<SupervisorCommand>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    pub(crate) fn new(commands: mpsc::Sender<SupervisorCommand>, task: JoinHandle<()>) -> Self {
        Self { commands, task }
    }

    /// Ask the supervisor to stop every service. Idempotent.
    pub async fn stop(&self) {
        if self.commands.send(SupervisorCommand::Stop).await.is_err() {
            debug!("supervisor already finished; stop ignored");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the supervisor task to finish. Does not request a stop.
    pub async fn join(self) -> Result<()> {
        let SupervisorHandle { commands, task } = self;
        let result = task.await;
        drop(commands);
        result.map_err(|err| anyhow::Error::from(err).into())
    }
}
