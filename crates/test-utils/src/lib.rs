pub mod builders;
pub mod fake_control_plane;
pub mod fake_launcher;

use std::sync::Once;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};
use pocket_cloud_server::engine::SupervisorEvent;

pub use fake_control_plane::FakeControlPlane;
pub use fake_launcher::{FakeLauncher, ManualHandle};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Next supervisor event, failing the test after 5 seconds.
pub async fn next_event(rx: &mut mpsc::Receiver<SupervisorEvent>) -> SupervisorEvent {
    with_timeout(rx.recv())
        .await
        .expect("supervisor event channel closed")
}

/// Collect events up to and including the first `Stopped`.
pub async fn events_until_stopped(rx: &mut mpsc::Receiver<SupervisorEvent>) -> Vec<SupervisorEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = matches!(event, SupervisorEvent::Stopped(_));
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Collect events up to and including the first one matching `pred`.
pub async fn events_until<P>(rx: &mut mpsc::Receiver<SupervisorEvent>, pred: P) -> Vec<SupervisorEvent>
where
    P: Fn(&SupervisorEvent) -> bool,
{
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = pred(&event);
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Render events with their `Display` form, for compact assertions.
pub fn labels(events: &[SupervisorEvent]) -> Vec<String> {
    events.iter().map(|e| e.to_string()).collect()
}
