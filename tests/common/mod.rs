#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use pocket_cloud_server::api::StatusBoard;
use pocket_cloud_server::config::Environment;
use pocket_cloud_server::engine::{Supervisor, SupervisorEvent, SupervisorHandle, SupervisorOptions};
use pocket_cloud_server::fs::mock::MockFileSystem;
use pocket_cloud_server::registry::RegistrySource;

pub use pocket_cloud_test_utils::*;

/// A supervisor running on fakes, plus the handles a test needs to poke at
/// it.
pub struct Harness {
    pub env: Environment,
    pub launcher: FakeLauncher,
    pub control_plane: FakeControlPlane,
    pub fs: MockFileSystem,
    pub status: StatusBoard,
    pub events: mpsc::Receiver<SupervisorEvent>,
    pub handle: SupervisorHandle,
}

pub fn test_env() -> Environment {
    builders::EnvironmentBuilder::new(Path::new("/pc")).build()
}

pub struct HarnessBuilder {
    source: RegistrySource,
    launcher: FakeLauncher,
    control_plane: FakeControlPlane,
    fs: MockFileSystem,
    options: SupervisorOptions,
}

impl HarnessBuilder {
    pub fn new(source: RegistrySource) -> Self {
        Self {
            source,
            launcher: FakeLauncher::new(),
            control_plane: FakeControlPlane::new(),
            fs: MockFileSystem::new(),
            options: SupervisorOptions::default(),
        }
    }

    pub fn launcher(mut self, launcher: FakeLauncher) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn control_plane(mut self, control_plane: FakeControlPlane) -> Self {
        self.control_plane = control_plane;
        self
    }

    pub fn fs(mut self, fs: MockFileSystem) -> Self {
        self.fs = fs;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.options.shutdown_timeout = timeout;
        self
    }

    pub fn start(self) -> Harness {
        init_tracing();

        let env = test_env();
        let status = StatusBoard::new();
        let (tx, rx) = mpsc::channel::<SupervisorEvent>(256);

        let handle = Supervisor::new(
            env.clone(),
            self.source,
            self.launcher.clone(),
            self.control_plane.clone(),
            tx,
        )
        .with_options(self.options)
        .with_file_system(Arc::new(self.fs.clone()))
        .with_status_board(status.clone())
        .spawn();

        Harness {
            env,
            launcher: self.launcher,
            control_plane: self.control_plane,
            fs: self.fs,
            status,
            events: rx,
            handle,
        }
    }
}

impl Harness {
    /// Wait for `start` plus one `ON` per launched service.
    pub async fn until_all_on(&mut self, services: usize) -> Vec<SupervisorEvent> {
        let mut events = events_until(&mut self.events, |e| matches!(e, SupervisorEvent::Started)).await;
        for _ in 0..services {
            events.push(next_event(&mut self.events).await);
        }
        events
    }
}
