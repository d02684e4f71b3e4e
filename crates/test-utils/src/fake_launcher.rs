use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use pocket_cloud_server::engine::{ProcessEvent, ProcessNotification};
use pocket_cloud_server::exec::{Invocation, ProcessHandle, ProcessLauncher};
use pocket_cloud_server::types::ExitRecord;

/// Signal number reported when a fake process is stopped.
pub const FAKE_STOP_SIGNAL: i32 = 15;

#[derive(Default)]
struct LauncherState {
    invocations: Vec<Invocation>,
    failing: HashSet<String>,
    ignore_stop: HashSet<String>,
    manual_start: bool,
    services: HashMap<String, FakeService>,
}

struct FakeService {
    running: Arc<AtomicBool>,
    events: mpsc::Sender<ProcessEvent>,
    stop_requests: usize,
}

/// A fake launcher that:
/// - records every invocation it was asked to launch
/// - fails launches for names registered with `fail_on`
/// - reports `Started` right away (unless `manual_start` is set)
/// - lets the test drive each service's notifications by hand.
///
/// Clones share state: keep one as a controller, give one to the supervisor.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<LauncherState>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make launching `name` fail like a missing executable.
    pub fn fail_on(self, name: &str) -> Self {
        self.state.lock().unwrap().failing.insert(name.to_string());
        self
    }

    /// `stop()` on `name`'s handle is recorded but never carried out.
    pub fn ignore_stop(self, name: &str) -> Self {
        self.state.lock().unwrap().ignore_stop.insert(name.to_string());
        self
    }

    /// Do not report `Started` automatically on launch.
    pub fn manual_start(self) -> Self {
        self.state.lock().unwrap().manual_start = true;
        self
    }

    /// Names launched so far, in launch order (failed launches included).
    pub fn launched(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.invocations.iter().map(|i| i.name.clone()).collect()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.lock().unwrap().invocations.clone()
    }

    pub fn stop_requests(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.services.get(name).map(|s| s.stop_requests).unwrap_or(0)
    }

    pub fn is_running(&self, name: &str) -> bool {
        let state = self.state.lock().unwrap();
        state
            .services
            .get(name)
            .map(|s| s.running.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Send a raw notification on behalf of `name`'s handle.
    pub async fn notify(&self, name: &str, notification: ProcessNotification) {
        let events = {
            let state = self.state.lock().unwrap();
            let service = state
                .services
                .get(name)
                .unwrap_or_else(|| panic!("service '{name}' was never launched"));
            if notification == ProcessNotification::Exit {
                service.running.store(false, Ordering::SeqCst);
            }
            service.events.clone()
        };

        events
            .send(ProcessEvent::new(name, notification))
            .await
            .expect("supervisor dropped its process channel");
    }

    /// The process exits with `code` and the handle gives up.
    pub async fn crash(&self, name: &str, code: i32) {
        self.notify(name, ProcessNotification::ExitCode(ExitRecord::with_code(code)))
            .await;
        self.notify(name, ProcessNotification::Exit).await;
    }

    /// The process is killed by `signal` and the handle gives up.
    pub async fn kill(&self, name: &str, signal: i32) {
        self.notify(name, ProcessNotification::ExitCode(ExitRecord::with_signal(signal)))
            .await;
        self.notify(name, ProcessNotification::Exit).await;
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(
        &mut self,
        invocation: Invocation,
        events: mpsc::Sender<ProcessEvent>,
    ) -> anyhow::Result<Box<dyn ProcessHandle>> {
        let name = invocation.name.clone();
        let mut state = self.state.lock().unwrap();
        state.invocations.push(invocation);

        if state.failing.contains(&name) {
            anyhow::bail!("fake: cannot spawn evo-{name}: No such file or directory");
        }

        let running = Arc::new(AtomicBool::new(true));
        state.services.insert(
            name.clone(),
            FakeService {
                running: Arc::clone(&running),
                events: events.clone(),
                stop_requests: 0,
            },
        );

        if !state.manual_start {
            events
                .try_send(ProcessEvent::new(name.as_str(), ProcessNotification::Started))
                .expect("process channel full");
        }

        Ok(Box::new(FakeHandle {
            name,
            running,
            events,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeHandle {
    name: String,
    running: Arc<AtomicBool>,
    events: mpsc::Sender<ProcessEvent>,
    state: Arc<Mutex<LauncherState>>,
}

impl ProcessHandle for FakeHandle {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(service) = state.services.get_mut(&self.name) {
                service.stop_requests += 1;
            }
            if state.ignore_stop.contains(&self.name) {
                return;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        for notification in [
            ProcessNotification::Stopped,
            ProcessNotification::ExitCode(ExitRecord::with_signal(FAKE_STOP_SIGNAL)),
            ProcessNotification::Exit,
        ] {
            self.events
                .try_send(ProcessEvent::new(self.name.as_str(), notification))
                .expect("process channel full");
        }
    }
}

/// Stand-alone handle for driving a `ServiceMonitor` directly.
///
/// `stop()` only records the call and flips `running` off; the test feeds
/// the resulting notifications itself.
#[derive(Clone, Default)]
pub struct ManualHandle {
    running: Arc<AtomicBool>,
    stop_calls: Arc<AtomicUsize>,
}

impl ManualHandle {
    pub fn running() -> Self {
        let handle = Self::default();
        handle.running.store(true, Ordering::SeqCst);
        handle
    }

    pub fn idle() -> Self {
        Self::default()
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn boxed(&self) -> Box<dyn ProcessHandle> {
        Box::new(self.clone())
    }
}

impl ProcessHandle for ManualHandle {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}
